//! Single-consumer dispatch of action records.
//!
//! ```text
//! caller threads:  trigger_action() -> send_timeout(queue)   [bounded wait]
//!                                          ↓
//! worker thread:   recv() -> snapshot subscribers -> on_action() each
//! ```
//!
//! A full queue blocks the caller for at most `enqueue_timeout`; the record
//! is then dropped and counted.

use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use crossbeam_channel::bounded;
use crossbeam_channel::Receiver;
use crossbeam_channel::SendTimeoutError;
use crossbeam_channel::Sender;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use parking_lot::RwLock;
use tracing::debug;
use tracing::error;
use tracing::warn;

use super::ActionRecord;
use super::ActionSubscriber;
use super::LoggingSubscriber;
use crate::FacadeConfig;
use crate::MonitorConfig;

lazy_static! {
    static ref GLOBAL_MONITOR: Arc<ActionMonitor> =
        Arc::new(ActionMonitor::new(&FacadeConfig::load_or_default().monitor));
}

enum Job {
    Dispatch(ActionRecord),
    /// Acknowledged once every earlier job ran
    Flush(Sender<()>),
}

struct MonitorInner {
    subscribers: RwLock<Vec<Arc<dyn ActionSubscriber>>>,
    dropped: AtomicU64,
}

pub struct ActionMonitor {
    inner: Arc<MonitorInner>,
    sender: Sender<Job>,
    enqueue_timeout: Duration,
    default_subscriber: Arc<dyn ActionSubscriber>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ActionMonitor {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ActionMonitor")
            .field("subscribers", &self.subscriber_count())
            .field("queued", &self.sender.len())
            .field("dropped", &self.dropped_count())
            .finish_non_exhaustive()
    }
}

impl ActionMonitor {
    /// Starts the worker thread with the default logging subscriber installed
    pub fn new(config: &MonitorConfig) -> Self {
        let (sender, receiver) = bounded(config.queue_capacity.max(1));
        let default_subscriber: Arc<dyn ActionSubscriber> = Arc::new(LoggingSubscriber);
        let inner = Arc::new(MonitorInner {
            subscribers: RwLock::new(vec![default_subscriber.clone()]),
            dropped: AtomicU64::new(0),
        });

        let worker_inner = inner.clone();
        let worker = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || run_worker(worker_inner, receiver));
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!(error = %e, thread = %config.thread_name, "failed to spawn action monitor worker");
                None
            }
        };

        Self {
            inner,
            sender,
            enqueue_timeout: config.enqueue_timeout(),
            default_subscriber,
            worker: Mutex::new(worker),
        }
    }

    /// Process-wide monitor, created on first use
    pub fn global() -> Arc<ActionMonitor> {
        GLOBAL_MONITOR.clone()
    }

    /// Queues the record for delivery. Never fails visibly; waits at most the
    /// configured enqueue timeout.
    pub fn trigger_action(
        &self,
        record: ActionRecord,
    ) {
        match self.sender.send_timeout(Job::Dispatch(record), self.enqueue_timeout) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(Job::Dispatch(record))) => {
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(kind = %record.kind, path = %record.path, "action queue full, record dropped");
            }
            Err(e) => {
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "action monitor worker gone, record dropped");
            }
        }
    }

    /// Appends a subscriber; it sees records dispatched from now on
    pub fn add_subscriber(
        &self,
        subscriber: Arc<dyn ActionSubscriber>,
    ) {
        self.inner.subscribers.write().push(subscriber);
    }

    /// Removes the given subscriber instance. Returns whether it was found.
    pub fn remove_subscriber(
        &self,
        subscriber: &Arc<dyn ActionSubscriber>,
    ) -> bool {
        let target = Arc::as_ptr(subscriber) as *const ();
        let mut subscribers = self.inner.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| Arc::as_ptr(s) as *const () != target);
        subscribers.len() != before
    }

    /// The logging subscriber installed at construction
    pub fn default_subscriber(&self) -> Arc<dyn ActionSubscriber> {
        self.default_subscriber.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    /// Records lost to a full queue or a dead worker
    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Blocks until every record queued before this call was dispatched.
    /// Returns false on timeout.
    pub fn flush(
        &self,
        timeout: Duration,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        let (ack_tx, ack_rx) = bounded(1);
        if self.sender.send_timeout(Job::Flush(ack_tx), timeout).is_err() {
            return false;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        ack_rx.recv_timeout(remaining).is_ok()
    }
}

impl Drop for ActionMonitor {
    fn drop(&mut self) {
        // The worker exits once the queue disconnects.
        let (closed, _) = bounded(0);
        drop(std::mem::replace(&mut self.sender, closed));
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }
}

fn run_worker(
    inner: Arc<MonitorInner>,
    receiver: Receiver<Job>,
) {
    debug!("action monitor worker started");
    while let Ok(job) = receiver.recv() {
        match job {
            Job::Dispatch(record) => dispatch(&inner, &record),
            Job::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("action monitor worker stopped");
}

fn dispatch(
    inner: &MonitorInner,
    record: &ActionRecord,
) {
    let subscribers: Vec<Arc<dyn ActionSubscriber>> = inner.subscribers.read().clone();
    for subscriber in subscribers {
        match catch_unwind(AssertUnwindSafe(|| subscriber.on_action(record))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(kind = %record.kind, path = %record.path, error = %e, "action subscriber failed");
            }
            Err(_) => {
                error!(kind = %record.kind, path = %record.path, "action subscriber panicked");
            }
        }
    }
}
