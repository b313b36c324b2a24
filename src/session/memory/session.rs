use std::sync::atomic::AtomicI64;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::is_writable;
use super::state_for;
use super::MemoryEnsemble;
use crate::session::ConnectionState;
use crate::session::CreateMode;
use crate::session::OneshotWatch;
use crate::session::Session;
use crate::session::SessionOptions;
use crate::session::Stat;
use crate::session::StateListener;
use crate::Error;
use crate::ProgrammerError;
use crate::Result;

static NEXT_LOCAL_ID: AtomicU64 = AtomicU64::new(1);

/// Session bound to a [`MemoryEnsemble`]
pub struct MemorySession {
    local_id: u64,
    ensemble: Arc<MemoryEnsemble>,
    options: SessionOptions,
    session_id: AtomicI64,
    state: Mutex<ConnectionState>,
    listeners: Mutex<Vec<(u64, StateListener)>>,
    next_listener_id: AtomicU64,
    me: std::sync::Weak<MemorySession>,
}

impl std::fmt::Debug for MemorySession {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("MemorySession")
            .field("ensemble", &self.ensemble.name())
            .field("session_id", &self.session_id())
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl MemorySession {
    pub fn new(
        ensemble: Arc<MemoryEnsemble>,
        options: SessionOptions,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            local_id: NEXT_LOCAL_ID.fetch_add(1, Ordering::Relaxed),
            ensemble,
            options,
            session_id: AtomicI64::new(0),
            state: Mutex::new(ConnectionState::Latent),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            me: me.clone(),
        })
    }

    pub fn ensemble(&self) -> &Arc<MemoryEnsemble> {
        &self.ensemble
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Moves to `next` unless already there; listeners run outside the lock
    fn transition(
        &self,
        next: ConnectionState,
    ) {
        {
            let mut state = self.state.lock();
            if *state == next {
                return;
            }
            debug!(
                server = %self.options.connect_string,
                from = %*state,
                to = %next,
                "session state transition"
            );
            *state = next;
        }
        let listeners: Vec<StateListener> =
            self.listeners.lock().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(next);
        }
    }

    pub(super) fn on_suspended(&self) {
        if self.state().is_connected() {
            self.transition(ConnectionState::Suspended);
        }
    }

    /// Returns whether the session was alive and is now Lost
    pub(super) fn on_lost(&self) -> bool {
        let state = self.state();
        if state.is_connected() || state == ConnectionState::Suspended {
            self.transition(ConnectionState::Lost);
            true
        } else {
            false
        }
    }

    pub(super) fn on_restored(&self) {
        match self.state() {
            ConnectionState::Lost => {
                let id = self.ensemble.allocate_session_id();
                self.session_id.store(id, Ordering::SeqCst);
                self.transition(ConnectionState::Reconnected);
            }
            ConnectionState::Suspended | ConnectionState::ReadOnly => {
                self.transition(ConnectionState::Reconnected)
            }
            _ => {}
        }
    }

    pub(super) fn on_read_only(
        &self,
        read_only: bool,
    ) {
        let state = self.state();
        if read_only && state.is_connected() {
            self.transition(ConnectionState::ReadOnly);
        } else if !read_only && state == ConnectionState::ReadOnly {
            self.transition(ConnectionState::Reconnected);
        }
    }

    fn connection_lost(&self) -> Error {
        Error::ConnectionLost {
            server: self.options.connect_string.clone(),
        }
    }

    /// Waits out a suspension with the retry policy. Lost and closed
    /// sessions fail at once.
    async fn ensure_connected(
        &self,
        write: bool,
    ) -> Result<()> {
        let mut retries = 0;
        loop {
            match self.state() {
                ConnectionState::Connected | ConnectionState::Reconnected => return Ok(()),
                ConnectionState::ReadOnly if !write => return Ok(()),
                ConnectionState::ReadOnly | ConnectionState::Lost | ConnectionState::Latent => {
                    return Err(self.connection_lost())
                }
                ConnectionState::Closed => {
                    return Err(ProgrammerError::SessionClosed {
                        server: self.options.connect_string.clone(),
                    }
                    .into())
                }
                ConnectionState::Suspended => {
                    if !self.options.retry.allow_retry(retries) {
                        return Err(self.connection_lost());
                    }
                    tokio::time::sleep(self.options.retry.sleep_for(retries)).await;
                    retries += 1;
                }
            }
        }
    }

    async fn ensure_writable(&self) -> Result<()> {
        self.ensure_connected(true).await?;
        if !is_writable(self.ensemble.status()) {
            return Err(self.connection_lost());
        }
        Ok(())
    }
}

#[async_trait]
impl Session for MemorySession {
    fn session_id(&self) -> i64 {
        self.session_id.load(Ordering::SeqCst)
    }

    fn connect_string(&self) -> String {
        self.options.connect_string.clone()
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    fn start(&self) -> Result<()> {
        match self.state() {
            ConnectionState::Latent => {}
            ConnectionState::Closed => {
                return Err(ProgrammerError::SessionClosed {
                    server: self.options.connect_string.clone(),
                }
                .into())
            }
            _ => return Ok(()),
        }

        self.session_id
            .store(self.ensemble.allocate_session_id(), Ordering::SeqCst);
        if let Some(me) = self.me.upgrade() {
            self.ensemble.register(self.local_id, &me);
        }
        self.transition(state_for(self.ensemble.status()));
        Ok(())
    }

    fn close(&self) {
        if self.state() == ConnectionState::Closed {
            return;
        }
        self.ensemble.forget(self.local_id, self.session_id());
        self.transition(ConnectionState::Closed);
    }

    fn add_state_listener(
        &self,
        listener: StateListener,
    ) -> u64 {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, listener));
        id
    }

    fn remove_state_listener(
        &self,
        id: u64,
    ) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }

    async fn exists(
        &self,
        path: &str,
    ) -> Result<Option<Stat>> {
        self.ensure_connected(false).await?;
        Ok(self.ensemble.with_tree(|t| t.stat(path)))
    }

    async fn exists_watch(
        &self,
        path: &str,
    ) -> Result<(Option<Stat>, OneshotWatch)> {
        self.ensure_connected(false).await?;
        let id = self.session_id();
        Ok(self.ensemble.with_tree(|t| t.exists_watch(path, id)))
    }

    async fn get_data(
        &self,
        path: &str,
    ) -> Result<(Vec<u8>, Stat)> {
        self.ensure_connected(false).await?;
        self.ensemble.with_tree(|t| t.get_data(path))
    }

    async fn get_data_watch(
        &self,
        path: &str,
    ) -> Result<(Vec<u8>, Stat, OneshotWatch)> {
        self.ensure_connected(false).await?;
        let id = self.session_id();
        self.ensemble.with_tree(|t| t.get_data_watch(path, id))
    }

    async fn get_children(
        &self,
        path: &str,
    ) -> Result<Vec<String>> {
        self.ensure_connected(false).await?;
        self.ensemble.with_tree(|t| t.get_children(path))
    }

    async fn get_children_watch(
        &self,
        path: &str,
    ) -> Result<(Vec<String>, OneshotWatch)> {
        self.ensure_connected(false).await?;
        let id = self.session_id();
        self.ensemble.with_tree(|t| t.get_children_watch(path, id))
    }

    async fn create(
        &self,
        path: &str,
        data: Vec<u8>,
        mode: CreateMode,
    ) -> Result<String> {
        self.ensure_writable().await?;
        let id = self.session_id();
        self.ensemble.with_tree(|t| t.create(path, data, mode, id))
    }

    async fn set_data(
        &self,
        path: &str,
        data: Vec<u8>,
        version: Option<i32>,
    ) -> Result<Stat> {
        self.ensure_writable().await?;
        self.ensemble.with_tree(|t| t.set_data(path, data, version))
    }

    async fn delete(
        &self,
        path: &str,
        version: Option<i32>,
    ) -> Result<()> {
        self.ensure_writable().await?;
        self.ensemble.with_tree(|t| t.delete(path, version))
    }
}
