use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::db::DEFAULT_MAX_CONNECTIONS;
use crate::ledger::service::DEFAULT_RECENT_LIMIT;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    /// hourly | daily | never
    pub rotation: String,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Required when backend is postgres
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            postgres_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Records returned by the profile overview
    pub recent_records_limit: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            recent_records_limit: DEFAULT_RECENT_LIMIT,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthConfig {
    /// Name of the environment variable holding the HS256 secret
    pub jwt_secret_env: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret_env: "LEDGER_JWT_SECRET".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid config: {}", config_path))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(content).context("Failed to parse config yaml")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.storage.backend == StorageBackend::Postgres && self.storage.postgres_url.is_none() {
            bail!("storage.postgres_url is required for the postgres backend");
        }
        if self.ledger.recent_records_limit == 0 {
            bail!("ledger.recent_records_limit must be positive");
        }
        Ok(())
    }

    /// HS256 secret from the configured environment variable
    pub fn jwt_secret(&self) -> Result<String> {
        let name = &self.auth.jwt_secret_env;
        let secret = std::env::var(name)
            .with_context(|| format!("JWT secret env var {} is not set", name))?;
        if secret.is_empty() {
            bail!("JWT secret env var {} is empty", name);
        }
        Ok(secret)
    }
}
