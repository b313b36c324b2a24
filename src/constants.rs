// -
// Paths

pub const PATH_SEPARATOR: char = '/';
pub const ROOT_PATH: &str = "/";

// -
// Session sharing

/// Joins server and credential into the session registry key
pub const CREDENTIAL_SEPARATOR: &str = "-->";

/// Authorization scheme sent with credentials
pub const DIGEST_SCHEME: &str = "digest";

pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_RETRY_BASE_SLEEP_MS: u64 = 1_000;
pub const DEFAULT_RETRY_MAX_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_MAX_SLEEP_MS: u64 = i32::MAX as u64;

/// Larger values overflow the backoff shift
pub const MAX_RETRIES_LIMIT: u32 = 29;

// -
// Environment resolution

pub const ENVIRONMENT_PROPERTY: &str = "zookeeper.env";
pub const SERVER_PROPERTY_SUFFIX: &str = ".zookeeper.server";
pub const AUTH_PROPERTY_SUFFIX: &str = ".zookeeper.auth";

pub const ZOOKEEPER_PROPERTIES_FILE: &str = "zookeeper.properties";
pub const DEFAULT_ZOOKEEPER_SERVER_FILE: &str = "zookeeper_servers.properties";

// -
// Facade configuration

/// Env var naming an extra facade configuration file
pub const CONFIG_PATH_ENV: &str = "ZK_FACADE_CONFIG";
pub const CONFIG_ENV_PREFIX: &str = "ZKFACADE";

// -
// Action monitor

pub const DEFAULT_MONITOR_QUEUE_CAPACITY: usize = 4096;
pub const DEFAULT_MONITOR_ENQUEUE_TIMEOUT_MS: u64 = 50;
pub const DEFAULT_MONITOR_THREAD_NAME: &str = "zookeeper-monitor-subscribe-thread";

// -
// Serializers

pub const PROPERTIES_HEADER: &str = "Serialized by ZKClient -- PropertiesSerializer";

/// Width of the server-assigned sequential suffix
pub const SEQUENTIAL_SUFFIX_WIDTH: usize = 10;
