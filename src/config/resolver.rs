use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Property file lookup for the environment resolver
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResolverConfig {
    /// Directories searched in order; the first one holding a file wins
    #[serde(default = "default_search_dirs")]
    pub search_dirs: Vec<PathBuf>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            search_dirs: default_search_dirs(),
        }
    }
}

impl ResolverConfig {
    /// An empty list simply disables file lookup
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// First existing `dir/name` across the search directories
    pub fn locate(
        &self,
        name: &str,
    ) -> Option<PathBuf> {
        self.search_dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }
}

fn default_search_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("."), PathBuf::from("config")]
}
