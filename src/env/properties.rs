use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::RwLock;

lazy_static! {
    static ref GLOBAL_PROPERTIES: Arc<SystemProperties> = Arc::new(SystemProperties::new());
}

/// Process-wide property store.
///
/// Explicitly set values come first; otherwise the process environment is
/// consulted under the upper-cased key with `.` replaced by `_`
/// (`DEV.zookeeper.server` reads `DEV_ZOOKEEPER_SERVER`). Blank values count
/// as absent.
#[derive(Debug)]
pub struct SystemProperties {
    values: RwLock<HashMap<String, String>>,
    env_fallback: bool,
}

impl Default for SystemProperties {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProperties {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
            env_fallback: true,
        }
    }

    /// Store that never reads the process environment
    pub fn isolated() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
            env_fallback: false,
        }
    }

    pub fn global() -> Arc<SystemProperties> {
        GLOBAL_PROPERTIES.clone()
    }

    /// Returns the previous explicit value
    pub fn set_property(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Option<String> {
        self.values.write().insert(key.into(), value.into())
    }

    pub fn remove_property(
        &self,
        key: &str,
    ) -> Option<String> {
        self.values.write().remove(key)
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<String> {
        let explicit = self.values.read().get(key).cloned();
        explicit
            .or_else(|| {
                if self.env_fallback {
                    std::env::var(env_var_name(key)).ok()
                } else {
                    None
                }
            })
            .filter(|v| !v.trim().is_empty())
    }
}

/// Environment variable consulted for a property key
pub fn env_var_name(key: &str) -> String {
    key.replace('.', "_").to_uppercase()
}
