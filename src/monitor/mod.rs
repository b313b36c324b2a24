//! Action hook.
//!
//! Every completed facade operation is published as an [`ActionRecord`] to
//! the process-wide [`ActionMonitor`]. Records are delivered to subscribers
//! on one dedicated worker thread, FIFO by enqueue, subscribers in
//! registration order. Subscriber failures are logged and isolated.

mod dispatcher;
mod subscriber;
pub use dispatcher::*;
pub use subscriber::*;

#[cfg(test)]
mod dispatcher_test;

use std::fmt;
use std::sync::Arc;

use crate::BoxError;

/// Closed set of observable operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    GetData,
    DeletePath,
    GetChildNames,
    CreateEphemeral,
    CreatePersistent,
    UpdatePersistent,
    SetData,
    AddNodeCache,
    AddPathCache,
    AddTreeCache,
    AddCacheListener,
    RemoveCacheListener,
}

impl ActionKind {
    /// Stable name used in records and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::GetData => "GET_DATA",
            ActionKind::DeletePath => "DELETE_PATH",
            ActionKind::GetChildNames => "GET_CHILD_NAMES",
            ActionKind::CreateEphemeral => "CREATE_EPHEMERAL",
            ActionKind::CreatePersistent => "CREATE_PERSISTENT",
            ActionKind::UpdatePersistent => "UPDATE_PERSISTENT",
            ActionKind::SetData => "SET_DATA",
            ActionKind::AddNodeCache => "ADD_NODE_CACHE",
            ActionKind::AddPathCache => "ADD_PATH_CACHE",
            ActionKind::AddTreeCache => "ADD_TREE_CACHE",
            ActionKind::AddCacheListener => "ADD_CACHE_LISTENER",
            ActionKind::RemoveCacheListener => "REMOVE_CACHE_LISTENER",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value attached to a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionPayload {
    /// Serialized node data
    Bytes(Vec<u8>),
    /// Child names of a listing
    Names(Vec<String>),
}

impl fmt::Display for ActionPayload {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ActionPayload::Bytes(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
            ActionPayload::Names(names) => f.write_str(&names.join(",")),
        }
    }
}

/// Identity of the handle that performed an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleInfo {
    pub id: String,
    /// Free-form label, empty for server-bound handles
    pub environment: String,
    pub server: String,
}

#[derive(Debug, Clone)]
pub struct ActionRecord {
    pub kind: ActionKind,
    pub origin: Arc<HandleInfo>,
    /// Canonical path
    pub path: String,
    pub payload: Option<ActionPayload>,
}

/// Observer of action records. Runs on the monitor worker thread.
pub trait ActionSubscriber: Send + Sync + 'static {
    fn on_action(
        &self,
        record: &ActionRecord,
    ) -> std::result::Result<(), BoxError>;
}

impl<F> ActionSubscriber for F
where
    F: Fn(&ActionRecord) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
{
    fn on_action(
        &self,
        record: &ActionRecord,
    ) -> std::result::Result<(), BoxError> {
        self(record)
    }
}
