use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::*;
use crate::test_utils::enable_logger;
use crate::test_utils::RecordingSubscriber;
use crate::BoxError;
use crate::MonitorConfig;

const FLUSH: Duration = Duration::from_secs(5);

fn origin() -> Arc<HandleInfo> {
    Arc::new(HandleInfo {
        id: "h1".into(),
        environment: "DEV".into(),
        server: "zk:2181".into(),
    })
}

fn record(
    kind: ActionKind,
    path: &str,
) -> ActionRecord {
    ActionRecord {
        kind,
        origin: origin(),
        path: path.to_string(),
        payload: None,
    }
}

#[test]
fn action_kind_names_are_stable() {
    let names: Vec<&str> = [
        ActionKind::GetData,
        ActionKind::DeletePath,
        ActionKind::GetChildNames,
        ActionKind::CreateEphemeral,
        ActionKind::CreatePersistent,
        ActionKind::UpdatePersistent,
        ActionKind::SetData,
        ActionKind::AddNodeCache,
        ActionKind::AddPathCache,
        ActionKind::AddTreeCache,
        ActionKind::AddCacheListener,
        ActionKind::RemoveCacheListener,
    ]
    .iter()
    .map(ActionKind::as_str)
    .collect();

    assert_eq!(
        names,
        vec![
            "GET_DATA",
            "DELETE_PATH",
            "GET_CHILD_NAMES",
            "CREATE_EPHEMERAL",
            "CREATE_PERSISTENT",
            "UPDATE_PERSISTENT",
            "SET_DATA",
            "ADD_NODE_CACHE",
            "ADD_PATH_CACHE",
            "ADD_TREE_CACHE",
            "ADD_CACHE_LISTENER",
            "REMOVE_CACHE_LISTENER",
        ]
    );
    assert_eq!(ActionKind::SetData.to_string(), "SET_DATA");
}

#[test]
fn payload_renders_as_text() {
    assert_eq!(ActionPayload::Bytes(b"test".to_vec()).to_string(), "test");
    assert_eq!(
        ActionPayload::Names(vec!["a".into(), "b".into()]).to_string(),
        "a,b"
    );
}

#[test]
fn default_subscriber_is_installed() {
    let monitor = ActionMonitor::new(&MonitorConfig::default());
    assert_eq!(monitor.subscriber_count(), 1);

    assert!(monitor.remove_subscriber(&monitor.default_subscriber()));
    assert_eq!(monitor.subscriber_count(), 0);
    assert!(!monitor.remove_subscriber(&monitor.default_subscriber()));
}

#[test]
fn records_arrive_in_enqueue_order() {
    enable_logger();
    let monitor = ActionMonitor::new(&MonitorConfig::default());
    let recorder = Arc::new(RecordingSubscriber::default());
    monitor.add_subscriber(recorder.clone());

    for i in 0..100 {
        monitor.trigger_action(record(ActionKind::GetData, &format!("/n{i}")));
    }
    assert!(monitor.flush(FLUSH));

    let paths: Vec<String> = recorder.records().into_iter().map(|r| r.path).collect();
    let expected: Vec<String> = (0..100).map(|i| format!("/n{i}")).collect();
    assert_eq!(paths, expected);
}

#[test]
fn subscribers_run_in_registration_order() {
    let monitor = ActionMonitor::new(&MonitorConfig::default());
    let calls = Arc::new(Mutex::new(Vec::new()));
    for name in ["first", "second", "third"] {
        let calls = calls.clone();
        monitor.add_subscriber(Arc::new(move |_: &ActionRecord| -> Result<(), BoxError> {
            calls.lock().push(name);
            Ok(())
        }));
    }

    monitor.trigger_action(record(ActionKind::SetData, "/x"));
    assert!(monitor.flush(FLUSH));
    assert_eq!(*calls.lock(), vec!["first", "second", "third"]);
}

#[test]
fn failing_subscriber_is_isolated() {
    enable_logger();
    let monitor = ActionMonitor::new(&MonitorConfig::default());
    monitor.add_subscriber(Arc::new(|_: &ActionRecord| -> Result<(), BoxError> {
        Err("subscriber refused".into())
    }));
    monitor.add_subscriber(Arc::new(|_: &ActionRecord| -> Result<(), BoxError> {
        panic!("subscriber blew up")
    }));
    let recorder = Arc::new(RecordingSubscriber::default());
    monitor.add_subscriber(recorder.clone());

    monitor.trigger_action(record(ActionKind::CreatePersistent, "/a"));
    monitor.trigger_action(record(ActionKind::DeletePath, "/a"));
    assert!(monitor.flush(FLUSH));

    assert_eq!(recorder.kinds(), vec![ActionKind::CreatePersistent, ActionKind::DeletePath]);
}

#[test]
fn removed_subscriber_stops_receiving() {
    let monitor = ActionMonitor::new(&MonitorConfig::default());
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    let subscriber: Arc<dyn ActionSubscriber> = Arc::new(move |_: &ActionRecord| -> Result<(), BoxError> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    monitor.add_subscriber(subscriber.clone());

    monitor.trigger_action(record(ActionKind::GetData, "/a"));
    assert!(monitor.flush(FLUSH));
    assert!(monitor.remove_subscriber(&subscriber));
    monitor.trigger_action(record(ActionKind::GetData, "/b"));
    assert!(monitor.flush(FLUSH));

    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn full_queue_drops_after_bounded_wait() {
    let config = MonitorConfig {
        queue_capacity: 1,
        enqueue_timeout_ms: 10,
        thread_name: "monitor-test-full-queue".into(),
    };
    let monitor = ActionMonitor::new(&config);
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
    let release_rx = Mutex::new(release_rx);
    monitor.add_subscriber(Arc::new(move |_: &ActionRecord| -> Result<(), BoxError> {
        let _ = release_rx.lock().recv_timeout(Duration::from_secs(5));
        Ok(())
    }));

    let started = std::time::Instant::now();
    // One record blocks the worker, one fills the queue, the rest time out.
    for i in 0..5 {
        monitor.trigger_action(record(ActionKind::GetData, &format!("/q{i}")));
    }
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(monitor.dropped_count() >= 2, "dropped {}", monitor.dropped_count());

    drop(release_tx);
    assert!(monitor.flush(FLUSH));
}

#[test]
fn worker_thread_uses_configured_name() {
    let config = MonitorConfig {
        thread_name: "monitor-test-named".into(),
        ..MonitorConfig::default()
    };
    let monitor = ActionMonitor::new(&config);
    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();
    monitor.add_subscriber(Arc::new(move |_: &ActionRecord| -> Result<(), BoxError> {
        *sink.lock() = std::thread::current().name().map(str::to_string);
        Ok(())
    }));

    monitor.trigger_action(record(ActionKind::GetData, "/"));
    assert!(monitor.flush(FLUSH));
    assert_eq!(seen.lock().as_deref(), Some("monitor-test-named"));
}
