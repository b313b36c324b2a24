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
pub enum ChildrenCacheEvent {
    ChildAdded(ChildData),
    ChildUpdated(ChildData),
    ChildRemoved(ChildData),
    /// Initial load finished; carries the children present at that point
    Initialized(Vec<ChildData>),
    ConnectionSuspended,
    ConnectionReconnected,
    ConnectionLost,
}

pub trait ChildrenCacheListener: Send + Sync + 'static {
    fn child_event(
        &self,
        event: &ChildrenCacheEvent,
    );
}

impl<F> ChildrenCacheListener for F
where
    F: Fn(&ChildrenCacheEvent) + Send + Sync + 'static,
{
    fn child_event(
        &self,
        event: &ChildrenCacheEvent,
    ) {
        self(event)
    }
}

/// Mirror of the direct children of one path. The parent itself is
/// watched but never reported.
pub struct ChildrenCache {
    engine: Arc<CacheEngine>,
    listeners: Arc<ListenerContainer<dyn ChildrenCacheListener>>,
}

impl std::fmt::Debug for ChildrenCache {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ChildrenCache")
            .field("path", &self.engine.root())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl ChildrenCache {
    pub(crate) fn start(
        session: Arc<dyn Session>,
        path: String,
    ) -> Result<Arc<Self>> {
        let listeners: Arc<ListenerContainer<dyn ChildrenCacheListener>> = Arc::default();
        let notify = listeners.clone();
        let shape = CacheShape {
            max_depth: Some(1),
            include_root: false,
        };
        let engine = CacheEngine::start(
            session,
            path,
            shape,
            Box::new(move |event: CacheEvent| {
                if let Some(event) = to_children_event(event) {
                    notify.for_each(|l| l.child_event(&event));
                }
            }),
        )?;
        Ok(Arc::new(Self { engine, listeners }))
    }

    /// Children ordered by path
    pub fn current_data(&self) -> Vec<ChildData> {
        let root = self.engine.root();
        self.engine
            .snapshot()
            .iter()
            .filter(|(p, _)| p.as_str() != root)
            .map(|(_, node)| node.clone())
            .collect()
    }

    /// One child by its full path
    pub fn current_data_for(
        &self,
        full_path: &str,
    ) -> Option<ChildData> {
        let full_path = path::real_path(full_path);
        if full_path == self.engine.root() {
            return None;
        }
        self.engine.snapshot().get(&full_path).cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.is_initialized()
    }

    pub fn add_listener(
        &self,
        listener: Arc<dyn ChildrenCacheListener>,
    ) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(
        &self,
        listener: &Arc<dyn ChildrenCacheListener>,
    ) -> bool {
        self.listeners.remove(listener)
    }
}

fn to_children_event(event: CacheEvent) -> Option<ChildrenCacheEvent> {
    let event = match event {
        CacheEvent::Added(node) => ChildrenCacheEvent::ChildAdded(node),
        CacheEvent::Updated(node) => ChildrenCacheEvent::ChildUpdated(node),
        CacheEvent::Removed(node) => ChildrenCacheEvent::ChildRemoved(node),
        CacheEvent::Initialized(nodes) => ChildrenCacheEvent::Initialized(nodes),
        CacheEvent::Connection(ConnectionState::Suspended) => ChildrenCacheEvent::ConnectionSuspended,
        CacheEvent::Connection(ConnectionState::Reconnected) => ChildrenCacheEvent::ConnectionReconnected,
        CacheEvent::Connection(ConnectionState::Lost) => ChildrenCacheEvent::ConnectionLost,
        CacheEvent::Connection(_) => return None,
    };
    Some(event)
}

impl WatchCache for ChildrenCache {
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

impl Drop for ChildrenCache {
    fn drop(&mut self) {
        self.engine.close();
    }
}
