use std::path::Path;

use crate::config::schema::{Config, CONFIG_VERSION, MAX_TIMEOUT_SECS};
use crate::error::ConfigError;
use crate::extract::ExtractorRegistry;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != CONFIG_VERSION {
        return Err(validation(format!(
            "Unsupported config version: {}",
            config.version
        )));
    }

    if config.worker_count == 0 {
        return Err(validation("workerCount must be greater than 0"));
    }

    if config.upload_directory.trim().is_empty() {
        return Err(validation("uploadDirectory must not be empty"));
    }

    if config.upload.max_file_size == 0 {
        return Err(validation("upload.maxFileSize must be greater than 0"));
    }

    let registry = ExtractorRegistry::new();
    for ext in &config.upload.allowed_extensions {
        if !registry.supports_extension(ext) {
            return Err(validation(format!(
                "upload.allowedExtensions contains unsupported extension '{}'",
                ext
            )));
        }
    }

    let summarization = &config.summarization;
    if summarization.max_length == 0 {
        return Err(validation("summarization.maxLength must be greater than 0"));
    }
    if summarization.content_char_budget == 0 {
        return Err(validation(
            "summarization.contentCharBudget must be greater than 0",
        ));
    }
    if summarization.timeout_secs == 0 {
        return Err(validation("summarization.timeoutSecs must be greater than 0"));
    }
    if summarization.timeout_secs > MAX_TIMEOUT_SECS {
        return Err(validation(format!(
            "summarization.timeoutSecs must be at most {}",
            MAX_TIMEOUT_SECS
        )));
    }
    if summarization.enabled && summarization.api_url.trim().is_empty() {
        return Err(validation("summarization.apiUrl must not be empty"));
    }

    Ok(())
}

fn validation(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}
