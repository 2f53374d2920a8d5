use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

/// Top-level config loaded from `chart_engine.toml`. Falls back to
/// defaults when no file is present rather than failing startup.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub tenants: TenantConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WarehouseConfig {
    #[serde(default = "default_clickhouse_url")]
    pub url: String,
    #[serde(default = "default_clickhouse_database")]
    pub database: String,
    #[serde(default = "default_clickhouse_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            url: default_clickhouse_url(),
            database: default_clickhouse_database(),
            user: default_clickhouse_user(),
            password: String::new(),
        }
    }
}

fn default_clickhouse_url() -> String {
    "http://localhost:8123".to_string()
}

fn default_clickhouse_database() -> String {
    "analytics".to_string()
}

fn default_clickhouse_user() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// `ttl=None` at call time falls back to this default.
    #[serde(default = "default_ttl_seconds")]
    pub default_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: default_ttl_seconds(),
        }
    }
}

fn default_ttl_seconds() -> u64 {
    60
}

/// `org → "project.dataset.table"`. Loaded once at construction and
/// handed to an immutable `TableRouter`; a `project`/`dataset` prefix
/// from the environment may qualify a bare tenant id before it lands
/// here.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TenantConfig {
    #[serde(default)]
    pub tables: HashMap<String, String>,
}

impl EngineConfig {
    /// Load config from a TOML file. Returns defaults if the file doesn't
    /// exist.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&contents)?;
        tracing::info!("loaded config from {}", path.display());
        Ok(config)
    }
}
