//! Secret resolution for the summarization API key.
//!
//! Sources are tried in order:
//!
//! 1. **File reference** - Docker secrets pattern (e.g. `apiKeyFile: /run/secrets/deepseek`)
//! 2. **Env var reference** - e.g. `apiKeyEnv: DEEPSEEK_API_KEY`

use secrecy::SecretString;
use std::fs;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need a file path or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves a secret from a file, then from an environment variable.
/// Empty sources are skipped; values are trimmed.
pub fn resolve_secret(file_path: Option<&str>, env_var: Option<&str>) -> Result<SecretString> {
    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let expanded = expand_home(path);
        return match fs::read_to_string(&expanded) {
            Ok(content) => Ok(SecretString::from(content.trim().to_string())),
            Err(e) => Err(SecretError::FileReadError {
                path: expanded,
                source: e,
            }),
        };
    }

    if let Some(var_name) = env_var.filter(|v| !v.is_empty()) {
        return match std::env::var(var_name) {
            Ok(value) => Ok(SecretString::from(value.trim().to_string())),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: var_name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: var_name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Expands a leading `~` to the user's home directory. `~user/` is not supported.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy();
            if path == "~" {
                return home.into_owned();
            }
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}
