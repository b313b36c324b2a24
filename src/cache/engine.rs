//! Watch-driven mirror of one path (and optionally its descendants).
//!
//! One tokio task per cache owns the mirrored nodes and the armed one-shot
//! watches. A fired watch schedules a re-read of its node or child list;
//! the resulting diff is published as a new snapshot before any event
//! reaches a listener. After a reconnect the whole range is re-read and
//! every watch lost with the old session is armed again.
//!
//! ```text
//! tokio task:       watch fired -> re-read -> snapshot -> send(events)
//!                                                          ↓
//! dispatch thread:  recv() -> sink(event) -> listeners     [one per cache]
//! ```
//!
//! Listeners never run on the runtime, so a slow listener delays only the
//! events of its own cache.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use arc_swap::ArcSwap;
use crossbeam_channel::unbounded;
use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::FutureExt;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use crate::path;
use crate::session::ChildData;
use crate::session::ConnectionState;
use crate::session::OneshotWatch;
use crate::session::Session;
use crate::session::WatchEventType;
use crate::session::WatchedEvent;
use crate::Error;
use crate::ErrorKind;
use crate::ProgrammerError;
use crate::Result;

/// Raw change notification, mapped to a flavor-specific event by the owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CacheEvent {
    Added(ChildData),
    Updated(ChildData),
    Removed(ChildData),
    /// Initial population finished; carries the reported nodes
    Initialized(Vec<ChildData>),
    Connection(ConnectionState),
}

pub(crate) type EventSink = Box<dyn Fn(CacheEvent) + Send + Sync>;

/// Which part of the tree a cache mirrors
#[derive(Debug, Clone, Copy)]
pub(crate) struct CacheShape {
    /// Deepest level below the root that is mirrored; `None` is unbounded
    pub max_depth: Option<usize>,
    /// Whether the root itself is reported
    pub include_root: bool,
}

pub(crate) struct CacheEngine {
    root: String,
    shape: CacheShape,
    session: Arc<dyn Session>,
    snapshot: ArcSwap<BTreeMap<String, ChildData>>,
    initialized: AtomicBool,
    closed: AtomicBool,
    cancel: CancellationToken,
    state_listener: Mutex<Option<u64>>,
}

impl std::fmt::Debug for CacheEngine {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("CacheEngine")
            .field("root", &self.root)
            .field("shape", &self.shape)
            .field("nodes", &self.snapshot.load().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl CacheEngine {
    /// Spawns the cache task on the current runtime
    pub(crate) fn start(
        session: Arc<dyn Session>,
        root: String,
        shape: CacheShape,
        sink: EventSink,
    ) -> Result<Arc<Self>> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| ProgrammerError::NoRuntime { component: "watch cache" })?;

        let (state_tx, state_rx) = mpsc::unbounded_channel();
        let listener_id = session.add_state_listener(Arc::new(move |state: ConnectionState| {
            let _ = state_tx.send(state);
        }));

        let engine = Arc::new(Self {
            root,
            shape,
            session,
            snapshot: ArcSwap::from_pointee(BTreeMap::new()),
            initialized: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            state_listener: Mutex::new(Some(listener_id)),
        });

        let (events_tx, events_rx) = unbounded();
        let dispatch_engine = engine.clone();
        let dispatcher = std::thread::Builder::new()
            .name(format!("zk-cache:{}", engine.root))
            .spawn(move || run_dispatcher(dispatch_engine, events_rx, sink));
        if let Err(e) = dispatcher {
            error!(root = %engine.root, error = %e, "failed to spawn cache dispatch thread");
        }

        let task = CacheTask {
            engine: engine.clone(),
            nodes: BTreeMap::new(),
            armed: HashMap::new(),
            next_generation: 0,
            watches: FuturesUnordered::new(),
            events: events_tx,
        };
        runtime.spawn(task.run(state_rx));
        debug!(root = %engine.root, ?shape, "watch cache started");
        Ok(engine)
    }

    pub(crate) fn root(&self) -> &str {
        &self.root
    }

    /// Mirrored nodes, root included even when it is not reported
    pub(crate) fn snapshot(&self) -> Arc<BTreeMap<String, ChildData>> {
        self.snapshot.load_full()
    }

    pub(crate) fn is_reported(
        &self,
        path: &str,
    ) -> bool {
        self.shape.include_root || path != self.root
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stops the task and detaches from the session. Idempotent.
    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel.cancel();
        if let Some(id) = self.state_listener.lock().take() {
            self.session.remove_state_listener(id);
        }
        debug!(root = %self.root, "watch cache closed");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum WatchKind {
    Data,
    Children,
}

struct WatchFired {
    kind: WatchKind,
    path: String,
    generation: u64,
    /// `None` when the session discarded the watch
    event: Option<WatchedEvent>,
}

#[derive(Debug)]
enum Op {
    /// Re-read one node
    Node(String),
    /// Re-read one child list
    Children(String),
    /// Node is gone together with its subtree
    Remove(String),
}

struct CacheTask {
    engine: Arc<CacheEngine>,
    nodes: BTreeMap<String, ChildData>,
    /// Armed watches; stale firings carry an older generation
    armed: HashMap<(WatchKind, String), u64>,
    next_generation: u64,
    watches: FuturesUnordered<BoxFuture<'static, WatchFired>>,
    events: Sender<CacheEvent>,
}

impl CacheTask {
    async fn run(
        mut self,
        mut state_rx: mpsc::UnboundedReceiver<ConnectionState>,
    ) {
        let root = self.engine.root.clone();
        if !self.apply(vec![Op::Node(root.clone())], false).await {
            return;
        }
        self.engine.initialized.store(true, Ordering::Release);
        let initial = self
            .nodes
            .values()
            .filter(|node| self.engine.is_reported(&node.path))
            .cloned()
            .collect();
        self.deliver(CacheEvent::Initialized(initial));

        let cancel = self.engine.cancel.clone();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(state) = state_rx.recv() => {
                    if !self.on_state(state).await {
                        break;
                    }
                }
                Some(fired) = self.watches.next(), if !self.watches.is_empty() => {
                    if let Some(op) = self.on_watch(fired) {
                        if !self.apply(vec![op], false).await {
                            break;
                        }
                    }
                }
            }
        }
        trace!(root = %root, "watch cache task exited");
    }

    /// Returns false once cancelled
    async fn on_state(
        &mut self,
        state: ConnectionState,
    ) -> bool {
        match state {
            ConnectionState::Suspended => self.deliver(CacheEvent::Connection(state)),
            ConnectionState::Lost => {
                // Every watch died with the session.
                self.armed.clear();
                self.deliver(CacheEvent::Connection(state));
            }
            ConnectionState::Reconnected => {
                self.deliver(CacheEvent::Connection(state));
                let root = self.engine.root.clone();
                return self.apply(vec![Op::Node(root)], true).await;
            }
            _ => {}
        }
        true
    }

    fn on_watch(
        &mut self,
        fired: WatchFired,
    ) -> Option<Op> {
        let key = (fired.kind, fired.path);
        if self.armed.get(&key) != Some(&fired.generation) {
            return None;
        }
        self.armed.remove(&key);
        let (kind, path) = key;

        let event = fired.event?;
        trace!(?kind, %path, event = ?event.event_type, "watch fired");
        match (kind, event.event_type) {
            (WatchKind::Data, WatchEventType::NodeDeleted) if path != self.engine.root => {
                Some(Op::Remove(path))
            }
            (WatchKind::Data, _) => Some(Op::Node(path)),
            (WatchKind::Children, WatchEventType::NodeDeleted) => None,
            (WatchKind::Children, _) => Some(Op::Children(path)),
        }
    }

    /// Processes `ops` to completion, then publishes. Returns false once
    /// cancelled.
    async fn apply(
        &mut self,
        ops: Vec<Op>,
        resync: bool,
    ) -> bool {
        let cancel = self.engine.cancel.clone();
        let events = tokio::select! {
            _ = cancel.cancelled() => return false,
            events = self.process(ops, resync) => events,
        };

        self.engine.snapshot.store(Arc::new(self.nodes.clone()));
        for event in events {
            self.deliver(event);
        }
        true
    }

    async fn process(
        &mut self,
        ops: Vec<Op>,
        resync: bool,
    ) -> Vec<CacheEvent> {
        let mut queue: VecDeque<Op> = ops.into();
        let mut events = Vec::new();

        while let Some(op) = queue.pop_front() {
            let result = match op {
                Op::Node(path) => self.refresh_node(path, resync, &mut queue, &mut events).await,
                Op::Children(path) => {
                    self.refresh_children(path, resync, &mut queue, &mut events).await
                }
                Op::Remove(path) => {
                    self.remove_subtree(&path, &mut events);
                    Ok(())
                }
            };

            if let Err(e) = result {
                if e.kind() == ErrorKind::ConnectionLost {
                    // Nothing else will get through; the reconnect resync catches up.
                    debug!(root = %self.engine.root, error = %e, "cache refresh interrupted");
                    break;
                }
                warn!(root = %self.engine.root, error = %e, "cache refresh failed");
            }
        }
        events
    }

    async fn refresh_node(
        &mut self,
        path: String,
        resync: bool,
        queue: &mut VecDeque<Op>,
        events: &mut Vec<CacheEvent>,
    ) -> Result<()> {
        let session = self.engine.session.clone();
        let is_root = path == self.engine.root;
        let watch_armed = self.armed.contains_key(&(WatchKind::Data, path.clone()));

        // The root keeps an exists watch so its creation is seen; other
        // nodes only watch while they exist.
        let read = if is_root {
            let stat = if watch_armed {
                session.exists(&path).await?
            } else {
                let (stat, watch) = session.exists_watch(&path).await?;
                self.arm(WatchKind::Data, &path, watch);
                stat
            };
            match stat {
                Some(_) => session.get_data(&path).await,
                None => Err(Error::NoNode { path: path.clone() }),
            }
        } else if watch_armed {
            session.get_data(&path).await
        } else {
            session.get_data_watch(&path).await.map(|(data, stat, watch)| {
                self.arm(WatchKind::Data, &path, watch);
                (data, stat)
            })
        };

        let (data, stat) = match read {
            Ok(found) => found,
            Err(Error::NoNode { .. }) => {
                self.remove_subtree(&path, events);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let node = ChildData {
            path: path.clone(),
            stat,
            data,
        };
        let added = match self.nodes.get(&path) {
            None => {
                events.push(CacheEvent::Added(node.clone()));
                true
            }
            Some(old) if old.stat.mzxid != node.stat.mzxid || old.data != node.data => {
                events.push(CacheEvent::Updated(node.clone()));
                false
            }
            Some(_) => false,
        };
        self.nodes.insert(path.clone(), node);

        if (added || resync) && self.below_max_depth(&path) {
            queue.push_back(Op::Children(path));
        }
        Ok(())
    }

    async fn refresh_children(
        &mut self,
        path: String,
        resync: bool,
        queue: &mut VecDeque<Op>,
        events: &mut Vec<CacheEvent>,
    ) -> Result<()> {
        let session = self.engine.session.clone();
        let read = if self.armed.contains_key(&(WatchKind::Children, path.clone())) {
            session.get_children(&path).await
        } else {
            session.get_children_watch(&path).await.map(|(children, watch)| {
                self.arm(WatchKind::Children, &path, watch);
                children
            })
        };

        let names = match read {
            Ok(names) => names,
            Err(Error::NoNode { .. }) => {
                self.remove_subtree(&path, events);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let current: Vec<String> = names.iter().map(|name| path::join(&path, name)).collect();
        let vanished: Vec<String> = self
            .nodes
            .keys()
            .filter(|p| path::parent(p) == Some(path.as_str()) && !current.contains(p))
            .cloned()
            .collect();
        for gone in vanished {
            self.remove_subtree(&gone, events);
        }

        for child in current {
            if resync || !self.nodes.contains_key(&child) {
                queue.push_back(Op::Node(child));
            }
        }
        Ok(())
    }

    /// Drops `path` and everything below it, deepest first
    fn remove_subtree(
        &mut self,
        path: &str,
        events: &mut Vec<CacheEvent>,
    ) {
        let doomed: Vec<String> = self
            .nodes
            .keys()
            .filter(|p| path::depth_below(path, p).is_some())
            .rev()
            .cloned()
            .collect();
        for p in doomed {
            // The root keeps its exists watch across deletion.
            if p != self.engine.root {
                self.armed.remove(&(WatchKind::Data, p.clone()));
            }
            self.armed.remove(&(WatchKind::Children, p.clone()));
            if let Some(node) = self.nodes.remove(&p) {
                events.push(CacheEvent::Removed(node));
            }
        }
    }

    fn below_max_depth(
        &self,
        path: &str,
    ) -> bool {
        match (self.engine.shape.max_depth, path::depth_below(&self.engine.root, path)) {
            (None, _) => true,
            (Some(max), Some(depth)) => depth < max,
            (Some(_), None) => false,
        }
    }

    fn arm(
        &mut self,
        kind: WatchKind,
        path: &str,
        watch: OneshotWatch,
    ) {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.armed.insert((kind, path.to_string()), generation);

        let path = path.to_string();
        self.watches.push(
            async move {
                WatchFired {
                    kind,
                    path,
                    generation,
                    event: watch.await.ok(),
                }
            }
            .boxed(),
        );
    }

    fn deliver(
        &self,
        event: CacheEvent,
    ) {
        if self.engine.is_closed() {
            return;
        }
        let reported = match &event {
            CacheEvent::Added(node) | CacheEvent::Updated(node) | CacheEvent::Removed(node) => {
                self.engine.is_reported(&node.path)
            }
            CacheEvent::Initialized(_) | CacheEvent::Connection(_) => true,
        };
        if reported && self.events.send(event).is_err() {
            trace!(root = %self.engine.root, "cache dispatcher gone, event dropped");
        }
    }
}

/// Runs listeners in event order until the cache task drops its sender.
/// Events still queued when the cache closes are discarded.
fn run_dispatcher(
    engine: Arc<CacheEngine>,
    events: Receiver<CacheEvent>,
    sink: EventSink,
) {
    while let Ok(event) = events.recv() {
        if engine.is_closed() {
            continue;
        }
        sink(event);
    }
    trace!(root = %engine.root, "cache dispatch thread exited");
}
