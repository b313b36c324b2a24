use std::collections::BTreeMap;
use std::sync::Arc;

use super::engine::CacheEngine;
use super::engine::CacheEvent;
use super::engine::CacheShape;
use super::ListenerContainer;
use super::WatchCache;
use crate::path;
use crate::session::ChildData;
use crate::session::ConnectionState;
use crate::session::Session;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeCacheEvent {
    NodeAdded(ChildData),
    NodeUpdated(ChildData),
    NodeRemoved(ChildData),
    Initialized,
    ConnectionSuspended,
    ConnectionReconnected,
    ConnectionLost,
}

pub trait TreeCacheListener: Send + Sync + 'static {
    fn tree_event(
        &self,
        event: &TreeCacheEvent,
    );
}

impl<F> TreeCacheListener for F
where
    F: Fn(&TreeCacheEvent) + Send + Sync + 'static,
{
    fn tree_event(
        &self,
        event: &TreeCacheEvent,
    ) {
        self(event)
    }
}

/// Mirror of a path and every descendant
pub struct TreeCache {
    engine: Arc<CacheEngine>,
    listeners: Arc<ListenerContainer<dyn TreeCacheListener>>,
}

impl std::fmt::Debug for TreeCache {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("TreeCache")
            .field("path", &self.engine.root())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl TreeCache {
    pub(crate) fn start(
        session: Arc<dyn Session>,
        path: String,
    ) -> Result<Arc<Self>> {
        let listeners: Arc<ListenerContainer<dyn TreeCacheListener>> = Arc::default();
        let notify = listeners.clone();
        let shape = CacheShape {
            max_depth: None,
            include_root: true,
        };
        let engine = CacheEngine::start(
            session,
            path,
            shape,
            Box::new(move |event: CacheEvent| {
                if let Some(event) = to_tree_event(event) {
                    notify.for_each(|l| l.tree_event(&event));
                }
            }),
        )?;
        Ok(Arc::new(Self { engine, listeners }))
    }

    /// Cached node at `full_path`, if it lies inside this tree
    pub fn current_data(
        &self,
        full_path: &str,
    ) -> Option<ChildData> {
        self.engine.snapshot().get(&path::real_path(full_path)).cloned()
    }

    /// Cached children of `full_path` keyed by node name; `None` when the
    /// node itself is not cached
    pub fn current_children(
        &self,
        full_path: &str,
    ) -> Option<BTreeMap<String, ChildData>> {
        let full_path = path::real_path(full_path);
        let snapshot = self.engine.snapshot();
        if !snapshot.contains_key(&full_path) {
            return None;
        }
        let children = snapshot
            .iter()
            .filter(|(p, _)| path::parent(p) == Some(full_path.as_str()))
            .map(|(p, node)| (path::node_name(p).to_string(), node.clone()))
            .collect();
        Some(children)
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.is_initialized()
    }

    pub fn add_listener(
        &self,
        listener: Arc<dyn TreeCacheListener>,
    ) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(
        &self,
        listener: &Arc<dyn TreeCacheListener>,
    ) -> bool {
        self.listeners.remove(listener)
    }
}

fn to_tree_event(event: CacheEvent) -> Option<TreeCacheEvent> {
    let event = match event {
        CacheEvent::Added(node) => TreeCacheEvent::NodeAdded(node),
        CacheEvent::Updated(node) => TreeCacheEvent::NodeUpdated(node),
        CacheEvent::Removed(node) => TreeCacheEvent::NodeRemoved(node),
        CacheEvent::Initialized(_) => TreeCacheEvent::Initialized,
        CacheEvent::Connection(ConnectionState::Suspended) => TreeCacheEvent::ConnectionSuspended,
        CacheEvent::Connection(ConnectionState::Reconnected) => TreeCacheEvent::ConnectionReconnected,
        CacheEvent::Connection(ConnectionState::Lost) => TreeCacheEvent::ConnectionLost,
        CacheEvent::Connection(_) => return None,
    };
    Some(event)
}

impl WatchCache for TreeCache {
    fn path(&self) -> &str {
        self.engine.root()
    }

    fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn is_closed(&self) -> bool {
        self.engine.is_closed()
    }

    fn close(&self) {
        self.engine.close();
    }
}

impl Drop for TreeCache {
    fn drop(&mut self) {
        self.engine.close();
    }
}
