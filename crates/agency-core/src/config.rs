//! agency.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Compare-and-swap attempts a read-modify-write makes before giving up.
pub const DEFAULT_CAS_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgencyConfig {
    pub store: StoreConfig,
    pub cache: CacheConfig,
    pub mutations: MutationConfig,
    pub health: HealthConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// redb file backing the store. `None` keeps everything in memory.
    pub path: Option<PathBuf>,
    /// Root segment every route hangs off (`/<prefix>/Target/...`).
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When false, every cached read refetches from the store.
    pub version_gated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    /// Upper bound on compare-and-swap attempts for read-modify-write paths.
    pub cas_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Used when `Sync/HeartbeatIntervalMs` is missing from the store.
    pub default_heartbeat_interval_ms: u64,
    /// A server is stale after `stale_multiplier` missed intervals.
    pub stale_multiplier: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub filter: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            prefix: "arango".to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version_gated: true,
        }
    }
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            cas_attempts: DEFAULT_CAS_ATTEMPTS,
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            default_heartbeat_interval_ms: 1000,
            stale_multiplier: 2,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info,agency=debug".to_string(),
        }
    }
}

impl HealthConfig {
    pub fn default_heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.default_heartbeat_interval_ms)
    }
}

impl AgencyConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AgencyConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
