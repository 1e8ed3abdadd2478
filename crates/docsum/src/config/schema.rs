use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::format::SUPPORTED_EXTENSIONS;
use crate::secrets::{resolve_secret, SecretError};
use crate::summary::client::{DEFAULT_API_URL, DEFAULT_MODEL};
use crate::summary::WorkerSettings;

pub const CONFIG_VERSION: &str = "1.0";

/// Upper bound for `summarization.timeoutSecs`.
pub const MAX_TIMEOUT_SECS: u64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: String,
    #[serde(default = "default_upload_directory")]
    pub upload_directory: String,
    /// Falls back to `~/.docsum/data/docsum.db` when unset.
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub summarization: SummarizationConfig,
}

fn default_upload_directory() -> String {
    "./uploads".to_string()
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            upload_directory: default_upload_directory(),
            database_path: None,
            worker_count: default_worker_count(),
            upload: UploadConfig::default(),
            summarization: SummarizationConfig::default(),
        }
    }
}

impl Config {
    /// `~/.docsum/config.json`, if a home directory can be determined.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".docsum").join("config.json"))
    }

    pub fn database_path(&self) -> Option<PathBuf> {
        match &self.database_path {
            Some(path) => Some(PathBuf::from(path)),
            None => crate::store::default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    SUPPORTED_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

impl UploadConfig {
    /// Case-insensitive; `ext` may carry a leading dot.
    pub fn allows(&self, ext: &str) -> bool {
        let ext = crate::format::normalize_extension(ext);
        self.allowed_extensions
            .iter()
            .any(|allowed| crate::format::normalize_extension(allowed) == ext)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Read before `apiKeyEnv` when set, e.g. a mounted secret.
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default = "default_content_char_budget")]
    pub content_char_budget: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_key_env() -> String {
    "DEEPSEEK_API_KEY".to_string()
}

fn default_max_length() -> usize {
    300
}

fn default_content_char_budget() -> usize {
    4000
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: default_api_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            api_key_file: None,
            max_length: default_max_length(),
            content_char_budget: default_content_char_budget(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SummarizationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            max_length: self.max_length,
            content_char_budget: self.content_char_budget,
            timeout: self.timeout(),
        }
    }

    /// Reads the API key from `apiKeyFile`, falling back to the variable named
    /// by `apiKeyEnv`.
    pub fn resolve_api_key(&self) -> Result<SecretString, ConfigError> {
        resolve_secret(self.api_key_file.as_deref(), Some(&self.api_key_env)).map_err(
            |e| match e {
                SecretError::EnvVarNotSet { name } | SecretError::EnvVarNotUnicode { name } => {
                    ConfigError::MissingSecret { var: name }
                }
                other => ConfigError::Validation {
                    message: other.to_string(),
                },
            },
        )
    }
}
