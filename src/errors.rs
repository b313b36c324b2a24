//! Facade Error Hierarchy
//!
//! Every failure surfaced by the facade carries one [`ErrorKind`] tag:
//! remote failures reported by the coordination service, local
//! serialization and configuration failures, and programming errors made
//! by the caller.

use std::path::PathBuf;
use std::string::FromUtf8Error;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error used at plug-in seams (custom serializers, action subscribers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operation targeted a node that does not exist
    #[error("Node does not exist: {path}")]
    NoNode { path: String },

    /// Create targeted a node that already exists
    #[error("Node already exists: {path}")]
    NodeExists { path: String },

    /// Non-recursive delete of a node that still has children
    #[error("Node has children: {path}")]
    NotEmpty { path: String },

    /// Version-guarded update saw a different server version
    #[error("Version mismatch at {path}: expected {expected}, actual {actual}")]
    BadVersion {
        path: String,
        expected: i32,
        actual: i32,
    },

    /// Ephemeral nodes cannot own children
    #[error("Ephemeral node cannot have children: {path}")]
    NoChildrenForEphemerals { path: String },

    /// Session is not connected; the operation was not delivered
    #[error("Connection lost to zookeeper: {server}")]
    ConnectionLost { server: String },

    /// Serializer rejected the value or the buffer
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// Required configuration absent or invalid
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Caller violated an API contract
    #[error(transparent)]
    Programmer(#[from] ProgrammerError),
}

/// Stable classification of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoNode,
    NodeExists,
    NotEmpty,
    BadVersion,
    NoChildrenForEphemerals,
    ConnectionLost,
    Serialization,
    Configuration,
    Programmer,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoNode { .. } => ErrorKind::NoNode,
            Error::NodeExists { .. } => ErrorKind::NodeExists,
            Error::NotEmpty { .. } => ErrorKind::NotEmpty,
            Error::BadVersion { .. } => ErrorKind::BadVersion,
            Error::NoChildrenForEphemerals { .. } => ErrorKind::NoChildrenForEphemerals,
            Error::ConnectionLost { .. } => ErrorKind::ConnectionLost,
            Error::Serialization(_) => ErrorKind::Serialization,
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Programmer(_) => ErrorKind::Programmer,
        }
    }

    /// Whether the failure was reported by (or on the way to) the remote service
    pub fn is_remote(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NoNode
                | ErrorKind::NodeExists
                | ErrorKind::NotEmpty
                | ErrorKind::BadVersion
                | ErrorKind::NoChildrenForEphemerals
                | ErrorKind::ConnectionLost
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    /// Buffer is not valid UTF-8
    #[error("Invalid UTF-8 data: {0}")]
    Utf8(#[from] FromUtf8Error),

    /// Malformed textual property data
    #[error("Malformed properties at line {line}: {message}")]
    Properties { line: usize, message: String },

    /// Failure raised by a user supplied serializer
    #[error("Serializer failed: {0}")]
    Custom(#[source] BoxError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// Layered facade configuration failed to load
    #[error(transparent)]
    Load(#[from] ConfigError),

    /// Facade configuration loaded but failed validation
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("ZK environment not found.")]
    MissingEnvironment,

    #[error("ZK servers not found for {environment}")]
    MissingServer { environment: String },

    /// Process-wide registry requested before a session backend was installed
    #[error("No session backend installed")]
    NoBackend,

    /// Property file exists but could not be read
    #[error("Failed to read properties from {path:?}")]
    PropertyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ProgrammerError {
    #[error("{context} path can't be blank.")]
    BlankPath { context: &'static str },

    #[error("Zk server is blank")]
    BlankServer,

    #[error("Invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("Client {handle} closed twice")]
    DoubleClose { handle: String },

    #[error("Client {handle} is already closed")]
    HandleClosed { handle: String },

    #[error("No session acquired for server [{server}]")]
    SessionNotAcquired { server: String },

    #[error("Session to [{server}] is closed")]
    SessionClosed { server: String },

    #[error("Global {component} already installed")]
    AlreadyInstalled { component: &'static str },

    /// Background work requested outside a tokio runtime
    #[error("{component} must be created inside a tokio runtime")]
    NoRuntime { component: &'static str },
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Configuration(ConfigurationError::Load(e))
    }
}

impl From<FromUtf8Error> for Error {
    fn from(e: FromUtf8Error) -> Self {
        Error::Serialization(SerializationError::Utf8(e))
    }
}
