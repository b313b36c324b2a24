//! Coordination-service session seam.
//!
//! A [`Session`] is one authenticated connection to an ensemble. The
//! [`SessionRegistry`] shares sessions between handles by credential key;
//! the in-memory backend in [`memory`] implements the service semantics in
//! process. No backend is wired by default: applications install their
//! [`SessionFactory`] once through [`SessionRegistry::install_global_factory`].

pub mod memory;
mod registry;
pub use registry::*;


use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;
use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::constants::DIGEST_SCHEME;
use crate::RetryPolicy;
use crate::Result;

/// Connection state transitions observed on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Constructed, not started
    Latent,
    Connected,
    /// Connection interrupted; the session may still come back
    Suspended,
    Reconnected,
    /// Session expired server side; ephemerals and watches are gone
    Lost,
    ReadOnly,
    /// Closed locally
    Closed,
}

impl ConnectionState {
    /// Whether remote operations can be delivered
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connected | ConnectionState::Reconnected | ConnectionState::ReadOnly
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let s = match self {
            ConnectionState::Latent => "LATENT",
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Suspended => "SUSPENDED",
            ConnectionState::Reconnected => "RECONNECTED",
            ConnectionState::Lost => "LOST",
            ConnectionState::ReadOnly => "READ_ONLY",
            ConnectionState::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEventType {
    NodeCreated,
    NodeDeleted,
    NodeDataChanged,
    NodeChildrenChanged,
}

/// Payload of a fired one-shot watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedEvent {
    pub event_type: WatchEventType,
    pub path: String,
}

/// Resolves once when the watch fires. A closed channel means the session
/// discarded the watch (close or expiry).
pub type OneshotWatch = oneshot::Receiver<WatchedEvent>;

pub type StateListener = Arc<dyn Fn(ConnectionState) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreateMode {
    Persistent,
    Ephemeral,
    EphemeralSequential,
}

impl CreateMode {
    pub fn is_ephemeral(&self) -> bool {
        !matches!(self, CreateMode::Persistent)
    }

    pub fn is_sequential(&self) -> bool {
        matches!(self, CreateMode::EphemeralSequential)
    }
}

/// Node metadata as reported by the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stat {
    /// zxid of the create
    pub czxid: i64,
    /// zxid of the last data change
    pub mzxid: i64,
    /// zxid of the last child list change
    pub pzxid: i64,
    /// Create time, epoch millis
    pub ctime: i64,
    /// Last modification time, epoch millis
    pub mtime: i64,
    /// Data version
    pub version: i32,
    /// Child list version
    pub cversion: i32,
    /// ACL version
    pub aversion: i32,
    /// Owning session id for ephemerals, 0 otherwise
    pub ephemeral_owner: i64,
    pub data_length: i32,
    pub num_children: i32,
}

/// Snapshot of one node held by a cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildData {
    pub path: String,
    pub stat: Stat,
    pub data: Vec<u8>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct AuthInfo {
    pub scheme: String,
    pub auth: Vec<u8>,
}

impl AuthInfo {
    /// Digest credential; the raw string is sent as the digest bytes
    pub fn digest(credential: &str) -> Self {
        Self {
            scheme: DIGEST_SCHEME.to_string(),
            auth: credential.as_bytes().to_vec(),
        }
    }
}

impl fmt::Debug for AuthInfo {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("AuthInfo")
            .field("scheme", &self.scheme)
            .field("auth", &"****")
            .finish()
    }
}

/// Everything a factory needs to build a session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub connect_string: String,
    pub session_timeout: Duration,
    pub connection_timeout: Duration,
    pub retry: RetryPolicy,
    pub auth: Option<AuthInfo>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Session: Send + Sync + 'static {
    /// Server assigned id; also the owner of ephemerals this session creates
    fn session_id(&self) -> i64;

    fn connect_string(&self) -> String;

    fn state(&self) -> ConnectionState;

    /// Connects; state listeners see the first transition
    fn start(&self) -> Result<()>;

    /// Drops ephemerals and watches; later remote calls fail
    fn close(&self);

    fn add_state_listener(
        &self,
        listener: StateListener,
    ) -> u64;

    fn remove_state_listener(
        &self,
        id: u64,
    );

    async fn exists(
        &self,
        path: &str,
    ) -> Result<Option<Stat>>;

    /// Sets a data watch even when the node is absent
    async fn exists_watch(
        &self,
        path: &str,
    ) -> Result<(Option<Stat>, OneshotWatch)>;

    async fn get_data(
        &self,
        path: &str,
    ) -> Result<(Vec<u8>, Stat)>;

    async fn get_data_watch(
        &self,
        path: &str,
    ) -> Result<(Vec<u8>, Stat, OneshotWatch)>;

    /// Child names in service order
    async fn get_children(
        &self,
        path: &str,
    ) -> Result<Vec<String>>;

    async fn get_children_watch(
        &self,
        path: &str,
    ) -> Result<(Vec<String>, OneshotWatch)>;

    /// Returns the created path (with the sequential suffix, if any)
    async fn create(
        &self,
        path: &str,
        data: Vec<u8>,
        mode: CreateMode,
    ) -> Result<String>;

    /// `None` skips the version check
    async fn set_data(
        &self,
        path: &str,
        data: Vec<u8>,
        version: Option<i32>,
    ) -> Result<Stat>;

    async fn delete(
        &self,
        path: &str,
        version: Option<i32>,
    ) -> Result<()>;
}

/// Builds unstarted sessions
#[cfg_attr(test, automock)]
pub trait SessionFactory: Send + Sync + 'static {
    fn connect(
        &self,
        options: &SessionOptions,
    ) -> Result<Arc<dyn Session>>;
}
