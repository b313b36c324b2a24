use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::SystemProperties;
use crate::constants::AUTH_PROPERTY_SUFFIX;
use crate::constants::DEFAULT_ZOOKEEPER_SERVER_FILE;
use crate::constants::ENVIRONMENT_PROPERTY;
use crate::constants::SERVER_PROPERTY_SUFFIX;
use crate::constants::ZOOKEEPER_PROPERTIES_FILE;
use crate::ConfigurationError;
use crate::Properties;
use crate::ResolverConfig;
use crate::Result;

#[derive(Debug, Default)]
struct Resolved {
    environment: Option<String>,
    server: Option<String>,
    auth: Option<String>,
}

/// Lazily resolved connection settings of one environment.
///
/// Values are looked up on first use and remembered once found.
#[derive(Debug)]
pub struct EnvironmentSetting {
    properties: Arc<SystemProperties>,
    resolver: ResolverConfig,
    resolved: Mutex<Resolved>,
}

impl EnvironmentSetting {
    /// Environment taken from the `zookeeper.env` property
    pub fn new(
        properties: Arc<SystemProperties>,
        resolver: ResolverConfig,
    ) -> Self {
        Self {
            properties,
            resolver,
            resolved: Mutex::new(Resolved::default()),
        }
    }

    /// Fixed environment label; upper-cased, blank means "look it up"
    pub fn for_environment(
        environment: &str,
        properties: Arc<SystemProperties>,
        resolver: ResolverConfig,
    ) -> Self {
        let setting = Self::new(properties, resolver);
        let environment = environment.trim();
        if !environment.is_empty() {
            setting.resolved.lock().environment = Some(environment.to_uppercase());
        }
        setting
    }

    pub fn environment(&self) -> Result<String> {
        let mut resolved = self.resolved.lock();
        self.resolve_environment(&mut resolved)
    }

    pub fn server(&self) -> Result<String> {
        let mut resolved = self.resolved.lock();
        let environment = self.resolve_environment(&mut resolved)?;
        if let Some(server) = &resolved.server {
            return Ok(server.clone());
        }

        let key = format!("{environment}{SERVER_PROPERTY_SUFFIX}");
        let server = match self.properties.get(&key) {
            Some(server) => Some(server),
            None => match self.file_property(ZOOKEEPER_PROPERTIES_FILE, &key)? {
                Some(server) => Some(server),
                None => self.file_property(DEFAULT_ZOOKEEPER_SERVER_FILE, &key)?,
            },
        };
        let server = server.ok_or(ConfigurationError::MissingServer { environment })?;
        resolved.server = Some(server.clone());
        Ok(server)
    }

    /// `None` means unauthenticated
    pub fn auth(&self) -> Result<Option<String>> {
        let mut resolved = self.resolved.lock();
        let environment = self.resolve_environment(&mut resolved)?;
        if resolved.auth.is_some() {
            return Ok(resolved.auth.clone());
        }

        let key = format!("{environment}{AUTH_PROPERTY_SUFFIX}");
        let auth = match self.properties.get(&key) {
            Some(auth) => Some(auth),
            None => self.file_property(ZOOKEEPER_PROPERTIES_FILE, &key)?,
        };
        resolved.auth = auth.clone();
        Ok(auth)
    }

    fn resolve_environment(
        &self,
        resolved: &mut Resolved,
    ) -> Result<String> {
        if let Some(environment) = &resolved.environment {
            return Ok(environment.clone());
        }
        let environment = match self.properties.get(ENVIRONMENT_PROPERTY) {
            Some(environment) => Some(environment),
            None => self.file_property(ZOOKEEPER_PROPERTIES_FILE, ENVIRONMENT_PROPERTY)?,
        };
        let environment = environment
            .map(|e| e.trim().to_uppercase())
            .ok_or(ConfigurationError::MissingEnvironment)?;
        resolved.environment = Some(environment.clone());
        Ok(environment)
    }

    /// Non-blank value of `key` in the named property file, if the file exists
    fn file_property(
        &self,
        file: &str,
        key: &str,
    ) -> Result<Option<String>> {
        let Some(path) = self.resolver.locate(file) else {
            return Ok(None);
        };
        let text = std::fs::read_to_string(&path)
            .map_err(|source| ConfigurationError::PropertyFile { path: path.clone(), source })?;
        let properties = Properties::load(&text)?;
        debug!(file = %path.display(), key, "property file consulted");
        Ok(properties.get(key).map(str::to_string).filter(|v| !v.trim().is_empty()))
    }
}
