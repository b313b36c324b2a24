//! Watch caches.
//!
//! Three flavors turn one-shot watches into durable subscriptions:
//! [`NodeCache`] (one path), [`ChildrenCache`] (direct children) and
//! [`TreeCache`] (a whole subtree). Each handle owns one [`CacheTable`] per
//! flavor keyed by canonical path, so a path has at most one live cache per
//! handle and flavor. Caches run until their handle closes.

mod children;
mod engine;
mod node;
mod tree;
pub use children::*;
pub use node::*;
pub use tree::*;


use std::collections::HashMap;
use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use parking_lot::Mutex;
use parking_lot::RwLock;
use tracing::error;

use crate::ProgrammerError;
use crate::Result;

/// Behaviour shared by the three flavors
pub trait WatchCache: Send + Sync + 'static {
    /// Canonical path the cache is rooted at
    fn path(&self) -> &str;

    fn listener_count(&self) -> usize;

    fn is_closed(&self) -> bool;

    /// Stops watching; listeners receive nothing afterwards
    fn close(&self);
}

/// Ordered listener set; notification runs over a snapshot, so listeners
/// may attach or detach from inside a callback
pub struct ListenerContainer<L: ?Sized> {
    listeners: RwLock<Vec<Arc<L>>>,
}

impl<L: ?Sized> Default for ListenerContainer<L> {
    fn default() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }
}

impl<L: ?Sized> ListenerContainer<L> {
    pub fn add(
        &self,
        listener: Arc<L>,
    ) {
        self.listeners.write().push(listener);
    }

    /// Removes one occurrence of this listener instance
    pub fn remove(
        &self,
        listener: &Arc<L>,
    ) -> bool {
        let target = Arc::as_ptr(listener) as *const ();
        let mut listeners = self.listeners.write();
        match listeners.iter().position(|l| Arc::as_ptr(l) as *const () == target) {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Calls `f` for each listener; a panicking listener is logged and skipped
    pub fn for_each(
        &self,
        f: impl Fn(&L),
    ) {
        let listeners: Vec<Arc<L>> = self.listeners.read().clone();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| f(&listener))).is_err() {
                error!("cache listener panicked");
            }
        }
    }
}

/// Per-handle table of one cache flavor, keyed by canonical path.
/// Its own mutex covers the attach-or-create step and the closed flag, so
/// no cache is created once [`CacheTable::close_all`] ran.
pub struct CacheTable<C: ?Sized> {
    owner: String,
    state: Mutex<TableState<C>>,
}

struct TableState<C: ?Sized> {
    caches: HashMap<String, Arc<C>>,
    closed: bool,
}

impl<C: WatchCache + ?Sized> CacheTable<C> {
    /// Empty table; `owner` names the handle in errors
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            state: Mutex::new(TableState {
                caches: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// Existing cache for `path`, or the one `create` builds. The flag tells
    /// whether this call created it. Fails once the table is closed.
    pub fn get_or_create(
        &self,
        path: &str,
        create: impl FnOnce() -> Result<Arc<C>>,
    ) -> Result<(Arc<C>, bool)> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(ProgrammerError::HandleClosed {
                handle: self.owner.clone(),
            }
            .into());
        }
        if let Some(cache) = state.caches.get(path) {
            return Ok((cache.clone(), false));
        }
        let cache = create()?;
        state.caches.insert(path.to_string(), cache.clone());
        Ok((cache, true))
    }

    pub fn get(
        &self,
        path: &str,
    ) -> Option<Arc<C>> {
        self.state.lock().caches.get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().caches.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Marks the table closed, then closes and forgets every cache
    pub fn close_all(&self) {
        let caches: Vec<Arc<C>> = {
            let mut state = self.state.lock();
            state.closed = true;
            state.caches.drain().map(|(_, c)| c).collect()
        };
        for cache in caches {
            cache.close();
        }
    }
}
