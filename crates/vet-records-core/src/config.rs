//! Client configuration loaded from the environment.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

pub const ENV_API_URL: &str = "VET_RECORDS_URL";
pub const ENV_API_KEY: &str = "VET_RECORDS_ANON_KEY";
pub const ENV_API_KEY_FILE: &str = "VET_RECORDS_ANON_KEY_FILE";
pub const ENV_DEBOUNCE_MS: &str = "VET_RECORDS_DEBOUNCE_MS";
pub const ENV_PHOTO_BUCKET: &str = "VET_RECORDS_PHOTO_BUCKET";
pub const ENV_PHOTO_MAX_BYTES: &str = "VET_RECORDS_PHOTO_MAX_BYTES";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "VET_RECORDS_HTTP_TIMEOUT_SECS";

pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
pub const DEFAULT_PHOTO_BUCKET: &str = "pets";
pub const DEFAULT_PHOTO_MAX_BYTES: u64 = 5 * 1024 * 1024;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to read secret {path}: {source}")]
    Secret {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings for the hosted backend and client-side behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct ClinicConfig {
    /// Base URL of the hosted backend (table API under `/rest/v1`, storage under `/storage/v1`)
    pub api_url: String,
    /// Public (anon) API key
    pub api_key: String,
    /// Quiet period before a typed query is sent
    pub search_debounce: Duration,
    /// Bucket holding patient photos
    pub photo_bucket: String,
    /// Largest accepted photo, in bytes
    pub photo_max_bytes: u64,
    /// Per-request timeout for HTTP calls
    pub http_timeout: Duration,
}

impl ClinicConfig {
    /// Defaults for everything except the backend location.
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            search_debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            photo_bucket: DEFAULT_PHOTO_BUCKET.to_string(),
            photo_max_bytes: DEFAULT_PHOTO_MAX_BYTES,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    /// Load from process environment variables.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup(ENV_API_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(ENV_API_URL))?;
        url::Url::parse(&api_url).map_err(|e| ConfigError::Invalid {
            key: ENV_API_URL,
            value: api_url.clone(),
            reason: e.to_string(),
        })?;

        let api_key = match lookup(ENV_API_KEY).filter(|v| !v.trim().is_empty()) {
            Some(key) => key,
            None => {
                let path = lookup(ENV_API_KEY_FILE)
                    .map(PathBuf::from)
                    .ok_or(ConfigError::Missing(ENV_API_KEY))?;
                read_secret(path)?
            }
        };

        let debounce_ms: u64 = parse_or_default(&lookup, ENV_DEBOUNCE_MS, DEFAULT_DEBOUNCE_MS)?;
        let photo_max_bytes = parse_or_default(&lookup, ENV_PHOTO_MAX_BYTES, DEFAULT_PHOTO_MAX_BYTES)?;
        let timeout_secs = parse_or_default(&lookup, ENV_HTTP_TIMEOUT_SECS, DEFAULT_HTTP_TIMEOUT_SECS)?;
        let photo_bucket = lookup(ENV_PHOTO_BUCKET).unwrap_or_else(|| {
            info!("{ENV_PHOTO_BUCKET} not set, using default: {DEFAULT_PHOTO_BUCKET}");
            DEFAULT_PHOTO_BUCKET.to_string()
        });

        Ok(Self {
            api_url,
            api_key,
            search_debounce: Duration::from_millis(debounce_ms),
            photo_bucket,
            photo_max_bytes,
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_or_default<F, T>(lookup: &F, key: &'static str, default: T) -> ConfigResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(value) => match value.trim().parse::<T>() {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                warn!("Invalid {key} value: {e}");
                Err(ConfigError::Invalid {
                    key,
                    value,
                    reason: e.to_string(),
                })
            }
        },
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

fn read_secret(path: PathBuf) -> ConfigResult<String> {
    std::fs::read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|source| {
            warn!("Failed to read secret from {}: {source}", path.display());
            ConfigError::Secret { path, source }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = ClinicConfig::from_lookup(lookup(&[
            (ENV_API_URL, "https://clinic.example.com"),
            (ENV_API_KEY, "anon"),
        ]))
        .unwrap();

        assert_eq!(config.search_debounce, Duration::from_millis(300));
        assert_eq!(config.photo_bucket, "pets");
        assert_eq!(config.photo_max_bytes, 5 * 1024 * 1024);
        assert_eq!(config, ClinicConfig::new("https://clinic.example.com", "anon"));
    }

    #[test]
    fn test_missing_url() {
        let result = ClinicConfig::from_lookup(lookup(&[(ENV_API_KEY, "anon")]));
        assert!(matches!(result, Err(ConfigError::Missing(ENV_API_URL))));
    }

    #[test]
    fn test_invalid_number() {
        let result = ClinicConfig::from_lookup(lookup(&[
            (ENV_API_URL, "https://clinic.example.com"),
            (ENV_API_KEY, "anon"),
            (ENV_DEBOUNCE_MS, "soon"),
        ]));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                key: ENV_DEBOUNCE_MS,
                ..
            })
        ));
    }

    #[test]
    fn test_key_from_secret_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anon_key");
        std::fs::write(&path, "secret-key\n").unwrap();

        let config = ClinicConfig::from_lookup(lookup(&[
            (ENV_API_URL, "https://clinic.example.com"),
            (ENV_API_KEY_FILE, path.to_str().unwrap()),
            (ENV_DEBOUNCE_MS, "150"),
        ]))
        .unwrap();
        assert_eq!(config.api_key, "secret-key");
        assert_eq!(config.search_debounce, Duration::from_millis(150));
    }
}
