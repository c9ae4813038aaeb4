use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub market_data: MarketDataConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
    /// Inline key; takes precedence over `api_key_env`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            temperature: default_temperature(),
            timeout_secs: default_request_timeout_secs(),
            api_key: None,
            api_key_env: default_api_key_env(),
        }
    }
}

impl LlmConfig {
    /// Inline key first, then the named environment variable
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataConfig {
    /// Quote service root; lookups are disabled when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Wall-clock budget for a whole run, in seconds
    #[serde(default = "default_run_budget_secs")]
    pub run_budget_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            run_budget_secs: default_run_budget_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_database_url() -> String {
    "sqlite://dealflow.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    64
}

/// Longest accepted run budget: one day
pub const MAX_RUN_BUDGET_SECS: u64 = 24 * 60 * 60;

fn default_run_budget_secs() -> u64 {
    300
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl SystemConfig {
    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: SystemConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::validation(format!(
                "llm.temperature must be within [0, 2], got {}",
                self.llm.temperature
            )));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::validation("llm.model must not be empty"));
        }
        if self.engine.workers == 0 {
            return Err(ConfigError::validation("engine.workers must be at least 1"));
        }
        if self.engine.queue_capacity == 0 {
            return Err(ConfigError::validation(
                "engine.queue_capacity must be at least 1",
            ));
        }
        if !(1..=MAX_RUN_BUDGET_SECS).contains(&self.engine.run_budget_secs) {
            return Err(ConfigError::validation(format!(
                "engine.run_budget_secs must be within [1, {}], got {}",
                MAX_RUN_BUDGET_SECS, self.engine.run_budget_secs
            )));
        }
        if self.storage.database_url.trim().is_empty() {
            return Err(ConfigError::validation(
                "storage.database_url must not be empty",
            ));
        }
        if self.storage.max_connections == 0 {
            return Err(ConfigError::validation(
                "storage.max_connections must be at least 1",
            ));
        }
        Ok(())
    }
}
