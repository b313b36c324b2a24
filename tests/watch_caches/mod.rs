use std::sync::Arc;

use parking_lot::Mutex;
use zk_facade::session::memory::MemoryEnsemble;
use zk_facade::ActionKind;
use zk_facade::ChildrenCacheEvent;
use zk_facade::TreeCacheEvent;
use zk_facade::WatchCache;

use crate::common::wait_until;
use crate::common::TestFacade;
use crate::common::WAIT;

#[tokio::test]
async fn children_cache_tracks_membership() {
    let t = TestFacade::new();
    let client = t.facade.client_for_server(&t.server, None).unwrap();
    client.create_persistent("/services/api/a").await.unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let cache = client
        .add_children_cache_listener(
            "services/api",
            Arc::new(move |e: &ChildrenCacheEvent| sink.lock().push(e.clone())),
        )
        .unwrap();

    let member = client.create_ephemeral_sequential("/services/api/m-").await.unwrap();
    assert!(
        wait_until(WAIT, || {
            let found = cache.current_data_for(&member).is_some();
            async move { found }
        })
        .await
    );

    client.delete_path(&member, false).await.unwrap();
    assert!(
        wait_until(WAIT, || {
            let gone = cache.current_data().len() == 1;
            async move { gone }
        })
        .await
    );
    assert!(
        wait_until(WAIT, || {
            let removed = events
                .lock()
                .iter()
                .any(|e| matches!(e, ChildrenCacheEvent::ChildRemoved(d) if d.path == member));
            async move { removed }
        })
        .await
    );

    let seen = events.lock().clone();
    assert!(seen.iter().any(|e| matches!(e, ChildrenCacheEvent::Initialized(_))));
    client.close().unwrap();
    assert!(cache.is_closed());
}

#[tokio::test]
async fn tree_cache_follows_nested_changes_and_reconnects() {
    let t = TestFacade::new();
    let client = t.facade.client_for_server(&t.server, None).unwrap();
    client.create_persistent("/tree").await.unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let cache = client
        .add_tree_cache_listener(
            "/tree",
            Arc::new(move |e: &TreeCacheEvent| sink.lock().push(e.clone())),
        )
        .unwrap();

    client.create_or_set("/tree/a/b", b"leaf".to_vec()).await.unwrap();
    assert!(
        wait_until(WAIT, || {
            let cached = cache.current_data("/tree/a/b").map(|d| d.data);
            async move { cached == Some(b"leaf".to_vec()) }
        })
        .await
    );

    let ensemble = MemoryEnsemble::named(&t.server);
    ensemble.suspend();
    ensemble.restore();
    assert!(
        wait_until(WAIT, || {
            let reconnected = events.lock().contains(&TreeCacheEvent::ConnectionReconnected);
            async move { reconnected }
        })
        .await
    );

    client.set_data("/tree/a/b", b"leaf2".to_vec()).await.unwrap();
    assert!(
        wait_until(WAIT, || {
            let cached = cache.current_data("/tree/a/b").map(|d| d.data);
            async move { cached == Some(b"leaf2".to_vec()) }
        })
        .await
    );

    assert!(events.lock().contains(&TreeCacheEvent::ConnectionSuspended));
    client.close().unwrap();
}

#[tokio::test]
async fn caches_are_per_handle() {
    let t = TestFacade::new();
    let a = t.facade.client_for_server(&t.server, None).unwrap();
    let b = t.facade.client_for_server(&t.server, None).unwrap();

    let from_a = a.node_cache("/shared").unwrap();
    let from_b = b.node_cache("/shared").unwrap();
    assert!(!Arc::ptr_eq(&from_a, &from_b));
    assert!(Arc::ptr_eq(&from_a, &a.node_cache("shared").unwrap()));

    a.close().unwrap();
    assert!(from_a.is_closed());
    assert!(!from_b.is_closed());
    b.close().unwrap();

    let adds = t
        .kinds()
        .into_iter()
        .filter(|k| *k == ActionKind::AddNodeCache)
        .count();
    assert_eq!(adds, 2);
}
