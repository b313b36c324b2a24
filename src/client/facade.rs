use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use super::ZkClient;
use crate::ActionMonitor;
use crate::EnvironmentSetting;
use crate::Error;
use crate::FacadeConfig;
use crate::ResolverConfig;
use crate::Result;
use crate::SessionRegistry;
use crate::SystemProperties;

static GLOBAL_FACADE: OnceCell<Arc<ZkFacade>> = OnceCell::new();

/// Factory of [`ZkClient`] handles.
///
/// Resolved environment settings are cached per upper-cased label, so the
/// property sources are read once per environment.
#[derive(Debug)]
pub struct ZkFacade {
    registry: Arc<SessionRegistry>,
    monitor: Arc<ActionMonitor>,
    properties: Arc<SystemProperties>,
    resolver: ResolverConfig,
    current: Arc<EnvironmentSetting>,
    settings: DashMap<String, Arc<EnvironmentSetting>>,
}

impl ZkFacade {
    pub fn new(
        registry: Arc<SessionRegistry>,
        monitor: Arc<ActionMonitor>,
        properties: Arc<SystemProperties>,
        resolver: ResolverConfig,
    ) -> Self {
        let current = Arc::new(EnvironmentSetting::new(properties.clone(), resolver.clone()));
        Self {
            registry,
            monitor,
            properties,
            resolver,
            current,
            settings: DashMap::new(),
        }
    }

    /// Facade over the global registry, monitor and property store.
    /// Fails with [`ConfigurationError::NoBackend`] until a session backend
    /// is installed.
    ///
    /// [`ConfigurationError::NoBackend`]: crate::ConfigurationError::NoBackend
    pub fn global() -> Result<Arc<ZkFacade>> {
        GLOBAL_FACADE
            .get_or_try_init(|| {
                let registry = SessionRegistry::global()?;
                Ok::<_, Error>(Arc::new(ZkFacade::new(
                    registry,
                    ActionMonitor::global(),
                    SystemProperties::global(),
                    FacadeConfig::load_or_default().resolver,
                )))
            })
            .cloned()
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn monitor(&self) -> &Arc<ActionMonitor> {
        &self.monitor
    }

    /// Handle for the configured default environment
    pub fn client(&self) -> Result<ZkClient> {
        let environment = self.current.environment()?;
        let setting = self
            .settings
            .entry(environment)
            .or_insert_with(|| self.current.clone())
            .clone();
        self.open(&setting)
    }

    /// Handle for an explicit environment label
    pub fn client_for_env(
        &self,
        environment: &str,
    ) -> Result<ZkClient> {
        let label = environment.trim().to_uppercase();
        let setting = self
            .settings
            .entry(label)
            .or_insert_with(|| {
                Arc::new(EnvironmentSetting::for_environment(
                    environment,
                    self.properties.clone(),
                    self.resolver.clone(),
                ))
            })
            .clone();
        self.open(&setting)
    }

    /// Handle bound directly to a server; its environment label is empty
    pub fn client_for_server(
        &self,
        server: &str,
        auth: Option<&str>,
    ) -> Result<ZkClient> {
        ZkClient::open("", server, auth, self.registry.clone(), self.monitor.clone())
    }

    fn open(
        &self,
        setting: &EnvironmentSetting,
    ) -> Result<ZkClient> {
        let environment = setting.environment()?;
        let server = setting.server()?;
        let auth = setting.auth()?;
        ZkClient::open(
            &environment,
            &server,
            auth.as_deref(),
            self.registry.clone(),
            self.monitor.clone(),
        )
    }
}
