use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::ai::ModelPricing;

/// File name looked up in the working directory by [`KengineConfig::discover`]
pub const CONFIG_FILE_NAME: &str = "kengine.toml";

/// Kengine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KengineConfig {
    /// Base directory for all storage
    pub base_dir: String,

    /// Template and output store ("memory"), relative to `base_dir`
    pub memory_dir: String,

    /// Process and step definitions, relative to `base_dir`
    pub processes_dir: String,

    /// Log level
    pub log_level: String,

    /// Chat API configuration
    pub api: ApiConfig,

    /// Conversation loop settings
    pub engine: EngineConfig,

    /// Default macro values, overridden by each step's macros
    pub macros: BTreeMap<String, String>,

    /// Model prices in USD per 1K tokens
    pub pricing: BTreeMap<String, ModelPricing>,
}

impl Default for KengineConfig {
    fn default() -> Self {
        let mut macros = BTreeMap::new();
        macros.insert("version".to_string(), "1.0".to_string());

        Self {
            base_dir: ".".to_string(),
            memory_dir: "Memory".to_string(),
            processes_dir: "Processes".to_string(),
            log_level: "info".to_string(),
            api: ApiConfig::default(),
            engine: EngineConfig::default(),
            macros,
            pricing: BTreeMap::new(),
        }
    }
}

impl KengineConfig {
    /// Load from configuration file
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        toml::from_str(&content).map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))
    }

    /// Load `./kengine.toml`, then `<config dir>/kengine/config.toml`,
    /// falling back to defaults when neither exists
    pub fn discover() -> anyhow::Result<Self> {
        for candidate in Self::candidate_paths() {
            if candidate.is_file() {
                tracing::debug!("Loading configuration from {}", candidate.display());
                return Self::load_from_file(&candidate);
            }
        }
        Ok(Self::default())
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(mut dir) = dirs::config_dir() {
            dir.push("kengine");
            dir.push("config.toml");
            paths.push(dir);
        }
        paths
    }

    /// Full path of the memory directory
    pub fn memory_path(&self) -> PathBuf {
        Path::new(&self.base_dir).join(&self.memory_dir)
    }

    /// Full path of the processes directory
    pub fn processes_path(&self) -> PathBuf {
        Path::new(&self.base_dir).join(&self.processes_dir)
    }
}

/// Chat API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of an OpenAI-compatible API
    pub base_url: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 120,
        }
    }
}

impl ApiConfig {
    /// Read the API key, loading `.env` first
    pub fn api_key(&self) -> Option<String> {
        dotenv::dotenv().ok();
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

/// Conversation loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Model used when a step's model is not available
    pub fallback_model: String,

    /// Maximum requests per `.exec` group
    pub max_interactions: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fallback_model: "gpt-3.5-turbo".to_string(),
            max_interactions: 50,
        }
    }
}
