//! Facade configuration.
//!
//! Layered the same way for every deployment:
//! - Type defaults as the code base
//! - Configuration file named by `ZK_FACADE_CONFIG`
//! - `ZKFACADE__*` environment variables (highest priority)
//!
//! The environment resolver's property files (`zookeeper.properties`,
//! `zookeeper_servers.properties`) are a separate surface handled by
//! [`crate::env`].

mod monitor;
mod resolver;
mod retry;
mod session;
pub use monitor::*;
pub use resolver::*;
pub use retry::*;
pub use session::*;


use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::constants::CONFIG_ENV_PREFIX;
use crate::constants::CONFIG_PATH_ENV;
use crate::Result;

/// Root configuration container
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct FacadeConfig {
    /// Session construction parameters shared by every acquired session
    #[serde(default)]
    pub session: SessionConfig,
    /// Action hook worker parameters
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Where the environment resolver looks for property files
    #[serde(default)]
    pub resolver: ResolverConfig,
}

impl FacadeConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Sources merged in order (later overrides earlier):
    /// 1. Type defaults
    /// 2. File from `ZK_FACADE_CONFIG` (if set)
    /// 3. Environment variables with the `ZKFACADE__` prefix
    ///
    /// # Example
    /// ```ignore
    /// std::env::set_var("ZKFACADE__MONITOR__QUEUE_CAPACITY", "128");
    /// let cfg = FacadeConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Layers another file over the current values, then re-applies the
    /// environment. Does not validate.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Consumes self and validates every section.
    pub fn validate(self) -> Result<Self> {
        self.session.validate()?;
        self.monitor.validate()?;
        self.resolver.validate()?;
        Ok(self)
    }

    /// Loaded and validated configuration, or the defaults when loading
    /// fails. Used to wire the process-wide singletons, which have no caller
    /// to report to.
    pub fn load_or_default() -> Self {
        match Self::new().and_then(Self::validate) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "invalid facade configuration, falling back to defaults");
                Self::default()
            }
        }
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(CONFIG_ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("resolver.search_dirs")
}
