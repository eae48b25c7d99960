//! Named resource pools, one dispatcher each.
//!
//! Different backends (or different classes of request against the same
//! backend) get independent ceilings. Pools are declared in TOML:
//!
//! ```toml
//! [[pool]]
//! name = "secondary"
//! max_concurrency = 3
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::dispatch::{DispatchConfig, Dispatcher};
use crate::error::{Error, Result};

/// Top-level TOML wrapper.
#[derive(Debug, Deserialize)]
struct PoolsFile {
    #[serde(default, rename = "pool")]
    pools: Vec<PoolConfig>,
}

/// One pool's settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PoolConfig {
    pub name: String,
    pub max_concurrency: usize,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_event_capacity() -> usize {
    DispatchConfig::default().event_capacity
}

impl PoolConfig {
    /// Parse and validate pool declarations without building dispatchers.
    pub fn parse_all(content: &str) -> Result<Vec<PoolConfig>> {
        let file: PoolsFile =
            toml::from_str(content).map_err(|e| Error::Config(format!("bad pools config: {e}")))?;

        let mut seen = HashSet::new();
        for pool in &file.pools {
            if pool.max_concurrency == 0 {
                return Err(Error::Config(format!(
                    "pool {:?}: max_concurrency must be at least 1",
                    pool.name
                )));
            }
            if !seen.insert(pool.name.as_str()) {
                return Err(Error::Config(format!("duplicate pool {:?}", pool.name)));
            }
        }

        Ok(file.pools)
    }
}

impl From<PoolConfig> for DispatchConfig {
    fn from(pool: PoolConfig) -> Self {
        Self {
            pool: pool.name,
            max_concurrency: pool.max_concurrency,
            event_capacity: pool.event_capacity,
        }
    }
}

/// Registry of dispatchers, indexed by pool name.
#[derive(Debug, Default)]
pub struct PoolRegistry {
    pools: HashMap<String, Dispatcher>,
}

impl PoolRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build one dispatcher per pool. Must run inside a Tokio runtime.
    pub fn from_configs(configs: Vec<PoolConfig>) -> Result<Self> {
        let mut pools = HashMap::with_capacity(configs.len());
        for config in configs {
            let name = config.name.clone();
            let dispatcher = Dispatcher::with_config(config.into())?;
            if pools.insert(name.clone(), dispatcher).is_some() {
                return Err(Error::Config(format!("duplicate pool {name:?}")));
            }
        }
        Ok(Self { pools })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Self::from_configs(PoolConfig::parse_all(content)?)
    }

    /// Load pool declarations from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read pools file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Look up a pool's dispatcher by name.
    pub fn get(&self, name: &str) -> Option<&Dispatcher> {
        self.pools.get(name)
    }

    /// Pool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.pools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}
