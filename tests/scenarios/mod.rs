use std::sync::Arc;

use zk_facade::session::memory::MemoryEnsemble;
use zk_facade::ActionKind;
use zk_facade::ConnectionState;
use zk_facade::ErrorKind;
use zk_facade::NodeCacheListener;
use zk_facade::StringSerializer;
use zk_facade::WatchCache;

use crate::common::TestFacade;

#[tokio::test]
async fn root_exists_with_positive_ctime() {
    let t = TestFacade::new();
    let client = t.facade.client_for_server(&t.server, None).unwrap();

    assert!(client.exists("/").await.unwrap());
    let stat = client.stat("/").await.unwrap().expect("root stat");
    assert!(stat.ctime > 0);
    client.close().unwrap();
}

#[tokio::test]
async fn absent_node_reports_no_node() {
    let t = TestFacade::new();
    let client = t.facade.client_for_server(&t.server, None).unwrap();

    assert!(client.stat("/abcdefg").await.unwrap().is_none());
    assert!(!client.exists("/abcdefg").await.unwrap());
    assert_eq!(
        client.get_bytes("/abcdefg").await.unwrap_err().kind(),
        ErrorKind::NoNode
    );
    client.close().unwrap();
}

#[tokio::test]
async fn ephemeral_round_trip_then_recursive_delete() {
    let t = TestFacade::new();
    let client = t.facade.client_for_server(&t.server, None).unwrap();

    client
        .create_ephemeral_with("abcd/efg", &"test".to_string(), &StringSerializer)
        .await
        .unwrap();
    let value: String = client.get("abcd/efg", &StringSerializer).await.unwrap();
    assert_eq!(value, "test");
    client.delete_path("abcd", true).await.unwrap();

    assert_eq!(
        t.kinds(),
        vec![ActionKind::CreateEphemeral, ActionKind::GetData, ActionKind::DeletePath]
    );
    client.close().unwrap();
}

#[tokio::test]
async fn sequential_suffixes_sort_after_each_other() {
    let t = TestFacade::new();
    let client = t.facade.client_for_server(&t.server, None).unwrap();

    let p1 = client.create_ephemeral_sequential("abcd/efg").await.unwrap();
    let p2 = client.create_ephemeral_sequential("abcd/efg").await.unwrap();
    assert_ne!(p1, p2);
    assert!(p2 > p1, "{p2} should sort after {p1}");
    client.close().unwrap();
}

#[tokio::test]
async fn node_cache_listener_count_round_trips() {
    let t = TestFacade::new();
    let client = t.facade.client_for_server(&t.server, None).unwrap();
    let listener: Arc<dyn NodeCacheListener> = Arc::new(|| {});

    let cache = client
        .add_node_cache_listener("com/bytegen/dev", listener.clone())
        .unwrap();
    assert_eq!(cache.listener_count(), 1);
    let cache = client
        .remove_node_cache_listener("com/bytegen/dev", &listener)
        .unwrap();
    assert_eq!(cache.listener_count(), 0);
    assert_eq!(cache.path(), "/com/bytegen/dev");
    client.close().unwrap();
}

#[tokio::test]
async fn shared_session_closes_with_last_handle() {
    let t = TestFacade::new();
    let first = t.facade.client_for_server(&t.server, Some("user:pw")).unwrap();
    let second = t.facade.client_for_server(&t.server, Some("user:pw")).unwrap();
    let session = first.session().unwrap();
    assert_eq!(session.session_id(), second.session().unwrap().session_id());

    first.close().unwrap();
    assert_eq!(session.state(), ConnectionState::Connected);
    assert!(second.exists("/").await.unwrap());

    second.close().unwrap();
    assert_eq!(session.state(), ConnectionState::Closed);
    assert!(t.facade.registry().is_empty());
    assert_eq!(MemoryEnsemble::named(&t.server).session_count(), 0);
}

#[tokio::test]
async fn upsert_and_versioned_update() {
    let t = TestFacade::new();
    let client = t.facade.client_for_server(&t.server, None).unwrap();

    client.create_or_set("/cfg/app", b"b1".to_vec()).await.unwrap();
    client.create_or_set("/cfg/app", b"b2".to_vec()).await.unwrap();
    assert_eq!(client.get_bytes("/cfg/app").await.unwrap(), b"b2");

    let e = client
        .set_data_versioned("/cfg/app", b"b3".to_vec(), 0)
        .await
        .unwrap_err();
    assert_eq!(e.kind(), ErrorKind::BadVersion);
    assert_eq!(
        client.delete_path("/cfg", false).await.unwrap_err().kind(),
        ErrorKind::NotEmpty
    );
    client.close().unwrap();
}
