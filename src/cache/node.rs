use std::sync::Arc;

use super::engine::CacheEngine;
use super::engine::CacheEvent;
use super::engine::CacheShape;
use super::ListenerContainer;
use super::WatchCache;
use crate::session::ChildData;
use crate::session::Session;
use crate::Result;

/// Notified whenever the watched node is created, changed or deleted.
/// Read the new state through [`NodeCache::current_data`].
pub trait NodeCacheListener: Send + Sync + 'static {
    fn node_changed(&self);
}

impl<F> NodeCacheListener for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn node_changed(&self) {
        self()
    }
}

/// Mirror of a single node
pub struct NodeCache {
    engine: Arc<CacheEngine>,
    listeners: Arc<ListenerContainer<dyn NodeCacheListener>>,
}

impl std::fmt::Debug for NodeCache {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("NodeCache")
            .field("path", &self.engine.root())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl NodeCache {
    pub(crate) fn start(
        session: Arc<dyn Session>,
        path: String,
    ) -> Result<Arc<Self>> {
        let listeners: Arc<ListenerContainer<dyn NodeCacheListener>> = Arc::default();
        let notify = listeners.clone();
        let shape = CacheShape {
            max_depth: Some(0),
            include_root: true,
        };
        let engine = CacheEngine::start(
            session,
            path,
            shape,
            Box::new(move |event: CacheEvent| match event {
                CacheEvent::Added(_) | CacheEvent::Updated(_) | CacheEvent::Removed(_) => {
                    notify.for_each(|l| l.node_changed())
                }
                CacheEvent::Initialized(_) | CacheEvent::Connection(_) => {}
            }),
        )?;
        Ok(Arc::new(Self { engine, listeners }))
    }

    /// Last known state; `None` while the node is absent or not yet loaded
    pub fn current_data(&self) -> Option<ChildData> {
        self.engine.snapshot().get(self.engine.root()).cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.is_initialized()
    }

    pub fn add_listener(
        &self,
        listener: Arc<dyn NodeCacheListener>,
    ) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(
        &self,
        listener: &Arc<dyn NodeCacheListener>,
    ) -> bool {
        self.listeners.remove(listener)
    }
}

impl WatchCache for NodeCache {
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

impl Drop for NodeCache {
    fn drop(&mut self) {
        self.engine.close();
    }
}
