//! Wattwise configuration
//!
//! Values come from three layers, later ones winning:
//! 1. Built-in defaults
//! 2. TOML file ($WATTWISE_CONFIG, else ~/.config/wattwise/config.toml if present)
//! 3. Environment variables (GRAPHITI_URI, MODEL_CHOICE, ...)
//!
//! Secrets are never stored in the file. The provider API key is read from
//! the environment variable named by `provider.api_key_env`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable holding an explicit config file path
pub const CONFIG_ENV: &str = "WATTWISE_CONFIG";

/// Configuration errors, all fatal at startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required credential {0} is not set")]
    MissingCredential(String),

    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Fact store connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the Graphiti-compatible retrieval service
    #[serde(default = "default_store_uri")]
    pub uri: String,

    #[serde(default = "default_store_user")]
    pub user: String,

    #[serde(default = "default_store_password")]
    pub password: String,

    /// Upper bound on facts returned per search
    #[serde(default = "default_max_facts")]
    pub max_facts: usize,

    /// Restrict searches to these graph partitions (empty = all)
    #[serde(default)]
    pub group_ids: Vec<String>,

    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

fn default_store_uri() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_store_user() -> String {
    "neo4j".to_string()
}

fn default_store_password() -> String {
    "password".to_string()
}

fn default_max_facts() -> usize {
    10
}

fn default_store_timeout() -> u64 {
    30
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: default_store_uri(),
            user: default_store_user(),
            password: default_store_password(),
            max_facts: default_max_facts(),
            group_ids: Vec::new(),
            timeout_secs: default_store_timeout(),
        }
    }
}

/// Completion provider (OpenAI-compatible)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// e.g. "https://api.openai.com/v1" or "http://localhost:11434/v1" (Ollama)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the environment variable containing the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_provider_timeout() -> u64 {
    120
}

fn default_temperature() -> f32 {
    0.2
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_provider_timeout(),
            temperature: default_temperature(),
        }
    }
}

impl ProviderConfig {
    /// Local servers (Ollama, llama.cpp) don't need an API key
    pub fn is_local(&self) -> bool {
        self.base_url.contains("localhost")
            || self.base_url.contains("127.0.0.1")
            || self.base_url.contains("11434")
    }

    /// Read the API key, failing for remote providers without one
    pub fn resolve_api_key(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<String>, ConfigError> {
        match lookup(&self.api_key_env).filter(|k| !k.trim().is_empty()) {
            Some(key) => Ok(Some(key)),
            None if self.is_local() => Ok(None),
            None => Err(ConfigError::MissingCredential(self.api_key_env.clone())),
        }
    }
}

/// Agent defaults baked into the system instructions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_region")]
    pub default_region: String,

    /// $/kWh used when the user gives no rate or city
    #[serde(default = "default_rate")]
    pub default_rate: f64,

    #[serde(default = "default_analogy_count")]
    pub analogy_count: usize,

    /// Completion rounds that may request tools before the turn fails
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
}

fn default_region() -> String {
    "New York City".to_string()
}

fn default_rate() -> f64 {
    0.23
}

fn default_analogy_count() -> usize {
    5
}

fn default_max_tool_rounds() -> usize {
    8
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default_region: default_region(),
            default_rate: default_rate(),
            analogy_count: default_analogy_count(),
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

/// Form server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WattwiseConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl WattwiseConfig {
    /// Get default user config path: ~/.config/wattwise/config.toml
    pub fn user_config_path() -> Option<PathBuf> {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return Some(PathBuf::from(xdg).join("wattwise").join("config.toml"));
        }
        std::env::var("HOME")
            .ok()
            .map(|home| Path::new(&home).join(".config").join("wattwise").join("config.toml"))
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Load from the explicit path, $WATTWISE_CONFIG, or the user config,
    /// then apply environment overrides
    ///
    /// An explicit path that does not exist is an error; a missing user
    /// config just means defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);

        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(&path)?,
            None => match Self::user_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment variables onto the loaded values
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *target = value;
            }
        };

        set(&mut self.store.uri, "GRAPHITI_URI");
        set(&mut self.store.user, "GRAPHITI_USER");
        set(&mut self.store.password, "GRAPHITI_PASSWORD");
        set(&mut self.provider.model, "MODEL_CHOICE");
        set(&mut self.provider.base_url, "OPENAI_BASE_URL");
        set(&mut self.server.bind, "WATTWISE_BIND");
    }

    /// Reject values that can never work
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.store.uri.starts_with("http://") && !self.store.uri.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "store.uri must be an http(s) URL, got {}",
                self.store.uri
            )));
        }
        if self.store.max_facts == 0 {
            return Err(ConfigError::Invalid("store.max_facts must be at least 1".to_string()));
        }
        if self.provider.model.trim().is_empty() {
            return Err(ConfigError::Invalid("provider.model is empty".to_string()));
        }
        if self.agent.max_tool_rounds == 0 {
            return Err(ConfigError::Invalid(
                "agent.max_tool_rounds must be at least 1".to_string(),
            ));
        }
        if !(self.agent.default_rate > 0.0) {
            return Err(ConfigError::Invalid(
                "agent.default_rate must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
