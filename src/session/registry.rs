//! Reference-counted session sharing.
//!
//! One session per credential key (`server` or `server-->credential`).
//! Acquire and release run in the same critical section, so a key is either
//! absent or present with a refcount of at least one, and concurrent first
//! acquires construct exactly one session.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::AuthInfo;
use super::ConnectionState;
use super::Session;
use super::SessionFactory;
use super::SessionOptions;
use super::StateListener;
use crate::constants::CREDENTIAL_SEPARATOR;
use crate::ConfigurationError;
use crate::FacadeConfig;
use crate::ProgrammerError;
use crate::Result;
use crate::SessionConfig;

static GLOBAL_REGISTRY: OnceCell<Arc<SessionRegistry>> = OnceCell::new();

struct SessionEntry {
    session: Arc<dyn Session>,
    refs: usize,
}

pub struct SessionRegistry {
    factory: Arc<dyn SessionFactory>,
    config: SessionConfig,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.lock().len())
            .finish()
    }
}

/// Unit of session sharing
pub fn credential_key(
    server: &str,
    credential: Option<&str>,
) -> String {
    match credential.map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) => format!("{server}{CREDENTIAL_SEPARATOR}{c}"),
        None => server.to_string(),
    }
}

/// Same key with the credential masked, for logs
fn masked_key(
    server: &str,
    credential: Option<&str>,
) -> String {
    match credential.map(str::trim).filter(|c| !c.is_empty()) {
        Some(_) => format!("{server}{CREDENTIAL_SEPARATOR}****"),
        None => server.to_string(),
    }
}

impl SessionRegistry {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        config: SessionConfig,
    ) -> Self {
        Self {
            factory,
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Process-wide registry. Fails until a backend was installed with
    /// [`SessionRegistry::install_global`] or
    /// [`SessionRegistry::install_global_factory`].
    pub fn global() -> Result<Arc<SessionRegistry>> {
        GLOBAL_REGISTRY
            .get()
            .cloned()
            .ok_or_else(|| ConfigurationError::NoBackend.into())
    }

    /// Installs the process-wide registry. Fails if one is already installed.
    pub fn install_global(registry: Arc<SessionRegistry>) -> Result<()> {
        GLOBAL_REGISTRY.set(registry).map_err(|_| {
            ProgrammerError::AlreadyInstalled {
                component: "session registry",
            }
            .into()
        })
    }

    /// Installs a registry over `factory`, configured from [`FacadeConfig`]
    pub fn install_global_factory(factory: Arc<dyn SessionFactory>) -> Result<Arc<SessionRegistry>> {
        let config = FacadeConfig::load_or_default();
        let registry = Arc::new(SessionRegistry::new(factory, config.session));
        Self::install_global(registry.clone())?;
        info!("global session backend installed");
        Ok(registry)
    }

    /// Returns the shared session for the key, creating and starting it on
    /// first use, and takes one reference.
    pub fn acquire(
        &self,
        server: &str,
        credential: Option<&str>,
    ) -> Result<Arc<dyn Session>> {
        if server.trim().is_empty() {
            return Err(ProgrammerError::BlankServer.into());
        }
        let key = credential_key(server, credential);

        let mut sessions = self.sessions.lock();
        if !sessions.contains_key(&key) {
            let session = self.create_session(server, credential)?;
            sessions.insert(key.clone(), SessionEntry { session, refs: 0 });
        }

        let (session, refs) = match sessions.get_mut(&key) {
            Some(entry) => {
                entry.refs += 1;
                (entry.session.clone(), entry.refs)
            }
            None => {
                return Err(ProgrammerError::SessionNotAcquired {
                    server: server.to_string(),
                }
                .into())
            }
        };
        info!(
            server = %masked_key(server, credential),
            refs,
            "client count after create"
        );
        Ok(session)
    }

    /// Drops one reference; the last one closes and removes the session.
    /// Releasing an unknown key is logged and ignored.
    pub fn release(
        &self,
        server: &str,
        credential: Option<&str>,
    ) {
        let key = credential_key(server, credential);
        let masked = masked_key(server, credential);

        let mut sessions = self.sessions.lock();
        let remaining = match sessions.get_mut(&key) {
            Some(entry) => {
                info!(server = %masked, refs = entry.refs, "client count before close");
                entry.refs -= 1;
                entry.refs
            }
            None => {
                warn!(server = %masked, "release of a session that was never acquired");
                return;
            }
        };

        if remaining == 0 {
            if let Some(entry) = sessions.remove(&key) {
                entry.session.close();
                info!(server = %masked, "session closed");
            }
        }
    }

    /// Session for the key, if any handle holds it
    pub fn lookup(
        &self,
        server: &str,
        credential: Option<&str>,
    ) -> Option<Arc<dyn Session>> {
        self.sessions
            .lock()
            .get(&credential_key(server, credential))
            .map(|entry| entry.session.clone())
    }

    /// Current refcount for the key; 0 when absent
    pub fn ref_count(
        &self,
        server: &str,
        credential: Option<&str>,
    ) -> usize {
        self.sessions
            .lock()
            .get(&credential_key(server, credential))
            .map(|entry| entry.refs)
            .unwrap_or(0)
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    fn create_session(
        &self,
        server: &str,
        credential: Option<&str>,
    ) -> Result<Arc<dyn Session>> {
        let options = SessionOptions {
            connect_string: server.to_string(),
            session_timeout: self.config.session_timeout(),
            connection_timeout: self.config.connection_timeout(),
            retry: self.config.retry.policy(),
            auth: credential
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(AuthInfo::digest),
        };

        let session = self.factory.connect(&options)?;
        session.add_state_listener(state_logger(masked_key(server, credential)));
        session.start()?;
        debug!(server = %masked_key(server, credential), "session started");
        Ok(session)
    }
}

/// Logs the connection transitions of one session
fn state_logger(server: String) -> StateListener {
    Arc::new(move |state: ConnectionState| match state {
        ConnectionState::Connected => info!(%server, "Connection to zookeeper established"),
        ConnectionState::Suspended => warn!(%server, "Connection to zookeeper suspended"),
        ConnectionState::Reconnected => info!(%server, "Connection to zookeeper reconnected"),
        ConnectionState::Lost => error!(%server, "Connection to zookeeper lost"),
        ConnectionState::ReadOnly => info!(%server, "Connection to zookeeper is read-only"),
        ConnectionState::Latent | ConnectionState::Closed => {
            debug!(%server, %state, "Connection state changed")
        }
    })
}
