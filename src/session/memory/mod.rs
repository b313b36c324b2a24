//! In-process coordination service.
//!
//! A [`MemoryEnsemble`] holds one node tree and every session connected to
//! it. Ensembles are shared process-wide by connect string, so two sessions
//! created for the same server see the same tree. Operator controls
//! ([`MemoryEnsemble::suspend`], [`MemoryEnsemble::expire`],
//! [`MemoryEnsemble::restore`], [`MemoryEnsemble::set_read_only`]) drive the
//! connection-state transitions of all its sessions.

mod session;
mod tree;
pub use session::*;


use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;

use dashmap::DashMap;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use parking_lot::RwLock;
use tracing::info;

use self::tree::DataTree;
use super::ConnectionState;
use super::Session;
use super::SessionFactory;
use super::SessionOptions;
use crate::Result;

lazy_static! {
    static ref ENSEMBLES: DashMap<String, Arc<MemoryEnsemble>> = DashMap::new();
}

/// Availability of the ensemble as seen by its clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsembleStatus {
    Serving,
    /// Quorum unreachable; sessions are suspended
    Unavailable,
    /// Reads only
    ReadOnly,
}

#[derive(Debug)]
pub struct MemoryEnsemble {
    name: String,
    tree: Mutex<DataTree>,
    status: RwLock<EnsembleStatus>,
    /// Started, unclosed sessions by local key
    sessions: DashMap<u64, Weak<MemorySession>>,
    next_session_id: AtomicI64,
}

impl MemoryEnsemble {
    /// Standalone ensemble, not reachable through the factory
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            tree: Mutex::new(DataTree::new()),
            status: RwLock::new(EnsembleStatus::Serving),
            sessions: DashMap::new(),
            next_session_id: AtomicI64::new(1),
        })
    }

    /// Process-wide ensemble for a connect string, created on first use
    pub fn named(connect_string: &str) -> Arc<Self> {
        ENSEMBLES
            .entry(connect_string.to_string())
            .or_insert_with(|| MemoryEnsemble::new(connect_string))
            .clone()
    }

    /// Forgets a named ensemble; existing sessions keep their reference
    pub fn discard(connect_string: &str) -> Option<Arc<Self>> {
        ENSEMBLES.remove(connect_string).map(|(_, e)| e)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> EnsembleStatus {
        *self.status.read()
    }

    /// Sessions started and not yet closed
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn node_count(&self) -> usize {
        self.tree.lock().node_count()
    }

    pub fn watch_count(&self) -> usize {
        self.tree.lock().watch_count()
    }

    /// Connection interrupted: every connected session becomes Suspended
    pub fn suspend(&self) {
        *self.status.write() = EnsembleStatus::Unavailable;
        info!(ensemble = %self.name, "ensemble unavailable");
        for session in self.live_sessions() {
            session.on_suspended();
        }
    }

    /// Server-side expiry: ephemerals and watches of every session are
    /// dropped and the sessions become Lost
    pub fn expire(&self) {
        info!(ensemble = %self.name, "expiring all sessions");
        for session in self.live_sessions() {
            if session.on_lost() {
                self.tree.lock().expire_session(session.session_id());
            }
        }
    }

    /// Quorum back: suspended and lost sessions reconnect, lost ones under a
    /// fresh session id
    pub fn restore(&self) {
        *self.status.write() = EnsembleStatus::Serving;
        info!(ensemble = %self.name, "ensemble serving");
        for session in self.live_sessions() {
            session.on_restored();
        }
    }

    /// Toggles read-only serving; writes fail while enabled
    pub fn set_read_only(
        &self,
        read_only: bool,
    ) {
        let status = if read_only {
            EnsembleStatus::ReadOnly
        } else {
            EnsembleStatus::Serving
        };
        *self.status.write() = status;
        info!(ensemble = %self.name, read_only, "ensemble read-only mode changed");
        for session in self.live_sessions() {
            session.on_read_only(read_only);
        }
    }

    pub(crate) fn with_tree<R>(
        &self,
        f: impl FnOnce(&mut DataTree) -> R,
    ) -> R {
        f(&mut self.tree.lock())
    }

    pub(crate) fn allocate_session_id(&self) -> i64 {
        self.next_session_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Tracks a started session under its local key
    pub(crate) fn register(
        &self,
        local_id: u64,
        session: &Arc<MemorySession>,
    ) {
        self.sessions.insert(local_id, Arc::downgrade(session));
    }

    /// Forgets a closed session and drops what it owned server side
    pub(crate) fn forget(
        &self,
        local_id: u64,
        session_id: i64,
    ) {
        self.sessions.remove(&local_id);
        self.tree.lock().expire_session(session_id);
    }

    fn live_sessions(&self) -> Vec<Arc<MemorySession>> {
        self.sessions.iter().filter_map(|e| e.value().upgrade()).collect()
    }
}

/// Connects sessions to the named ensemble of their connect string
#[derive(Debug, Default, Clone, Copy)]
pub struct MemorySessionFactory;

impl SessionFactory for MemorySessionFactory {
    fn connect(
        &self,
        options: &SessionOptions,
    ) -> Result<Arc<dyn Session>> {
        let ensemble = MemoryEnsemble::named(&options.connect_string);
        Ok(MemorySession::new(ensemble, options.clone()))
    }
}

pub(crate) fn is_writable(status: EnsembleStatus) -> bool {
    status == EnsembleStatus::Serving
}

pub(crate) fn state_for(status: EnsembleStatus) -> ConnectionState {
    match status {
        EnsembleStatus::Serving => ConnectionState::Connected,
        EnsembleStatus::Unavailable => ConnectionState::Suspended,
        EnsembleStatus::ReadOnly => ConnectionState::ReadOnly,
    }
}
