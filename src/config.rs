//! Server configuration.
//!
//! Everything has a working default; `CONVERTLY_*` environment variables
//! override individual values.

use crate::types::EncoderSettings;
use serde::Serialize;
use std::str::FromStr;
use thiserror::Error;

pub const ENV_HOST: &str = "CONVERTLY_HOST";
pub const ENV_PORT: &str = "CONVERTLY_PORT";
pub const ENV_WORKERS: &str = "CONVERTLY_WORKERS";
pub const ENV_MAX_FILE_SIZE: &str = "CONVERTLY_MAX_FILE_SIZE";
pub const ENV_MAX_FILES: &str = "CONVERTLY_MAX_FILES";
pub const ENV_JPEG_QUALITY: &str = "CONVERTLY_JPEG_QUALITY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Per-request upload limits.
#[derive(Debug, Clone, Serialize)]
pub struct UploadLimits {
    /// Maximum size of a single multipart part, in bytes.
    pub max_file_size: usize,
    /// Maximum number of `file` parts in one request.
    pub max_files: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024, // 10MB
            max_files: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Worker count; actix picks one per physical core when unset.
    pub workers: Option<usize>,
    pub limits: UploadLimits,
    pub encoder: EncoderSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8002,
            workers: None,
            limits: UploadLimits::default(),
            encoder: EncoderSettings::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from defaults plus whatever `lookup` returns.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup(ENV_HOST).filter(|host| !host.trim().is_empty()) {
            config.host = host.trim().to_string();
        }
        if let Some(port) = parse_var::<u16, _>(&lookup, ENV_PORT)? {
            config.port = port;
        }
        if let Some(workers) = parse_var::<usize, _>(&lookup, ENV_WORKERS)? {
            if workers == 0 {
                return Err(invalid(ENV_WORKERS, "0", "must be at least 1"));
            }
            config.workers = Some(workers);
        }
        if let Some(max_file_size) = parse_var::<usize, _>(&lookup, ENV_MAX_FILE_SIZE)? {
            if max_file_size == 0 {
                return Err(invalid(ENV_MAX_FILE_SIZE, "0", "must be positive"));
            }
            config.limits.max_file_size = max_file_size;
        }
        if let Some(max_files) = parse_var::<usize, _>(&lookup, ENV_MAX_FILES)? {
            if max_files == 0 {
                return Err(invalid(ENV_MAX_FILES, "0", "must be at least 1"));
            }
            config.limits.max_files = max_files;
        }
        if let Some(quality) = parse_var::<u8, _>(&lookup, ENV_JPEG_QUALITY)? {
            if !(1..=100).contains(&quality) {
                let value = quality.to_string();
                return Err(invalid(ENV_JPEG_QUALITY, &value, "must be within 1-100"));
            }
            config.encoder.jpeg_quality = quality;
        }

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| invalid(key, &raw, &e.to_string())),
    }
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_overrides() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8002);
        assert_eq!(config.workers, None);
        assert_eq!(config.limits.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.limits.max_files, 10);
        assert_eq!(config.encoder.jpeg_quality, 80);
    }

    #[test]
    fn applies_overrides() {
        let config = config_from(&[
            (ENV_HOST, "127.0.0.1"),
            (ENV_PORT, " 9000 "),
            (ENV_WORKERS, "2"),
            (ENV_MAX_FILE_SIZE, "1024"),
            (ENV_MAX_FILES, "3"),
            (ENV_JPEG_QUALITY, "95"),
        ])
        .unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.workers, Some(2));
        assert_eq!(config.limits.max_file_size, 1024);
        assert_eq!(config.limits.max_files, 3);
        assert_eq!(config.encoder.jpeg_quality, 95);
    }

    #[test]
    fn rejects_unparsable_values() {
        let err = config_from(&[(ENV_PORT, "eighty")]).unwrap_err();
        assert!(err.to_string().contains(ENV_PORT));

        assert!(config_from(&[(ENV_JPEG_QUALITY, "0")]).is_err());
        assert!(config_from(&[(ENV_JPEG_QUALITY, "300")]).is_err());
        assert!(config_from(&[(ENV_WORKERS, "0")]).is_err());
        assert!(config_from(&[(ENV_MAX_FILE_SIZE, "-5")]).is_err());
        assert!(config_from(&[(ENV_MAX_FILES, "0")]).is_err());
    }
}
