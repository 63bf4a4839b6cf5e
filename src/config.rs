// src/config.rs
use anyhow::{Context, Result, bail};
use std::str::FromStr;

pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub request_timeout_secs: u64,
    pub storage_backend: StorageBackend,
    pub redis_url: String,
    pub bind_addr: String,
    pub history_limit: usize,
    pub retention_secs: usize,
    pub max_upload_bytes: usize,
    pub max_image_dimension: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let gemini_api_key = get("GEMINI_API_KEY").context("GEMINI_API_KEY must be set")?;

        let storage_backend = match get("STORAGE_BACKEND").as_deref() {
            None | Some("redis") => StorageBackend::Redis,
            Some("memory") => StorageBackend::Memory,
            Some(other) => bail!("STORAGE_BACKEND must be 'redis' or 'memory', got '{}'", other),
        };

        Ok(Self {
            gemini_api_key,
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_base_url: get("GEMINI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            request_timeout_secs: parse_nonzero(&get, "REQUEST_TIMEOUT_SECS", 60)?,
            storage_backend,
            redis_url: get("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            history_limit: parse_nonzero(&get, "HISTORY_LIMIT", 5)?,
            retention_secs: parse_nonzero(&get, "RETENTION_SECS", 7 * 24 * 60 * 60)?,
            max_upload_bytes: parse_nonzero(&get, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            max_image_dimension: parse_nonzero(&get, "MAX_IMAGE_DIMENSION", 2048)?,
        })
    }

    /// Body limit for JSON scans, whose base64 images are a third larger than the raw upload.
    pub fn json_limit(&self) -> usize {
        (self.max_upload_bytes / 3)
            .saturating_mul(4)
            .saturating_add(64 * 1024)
    }
}

fn parse_nonzero<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr + Default + PartialEq,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    let value = parse_or(get, key, default)?;
    if value == T::default() {
        bail!("{} must be at least 1", key);
    }
    Ok(value)
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: '{}'", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = config_from(&[("GEMINI_API_KEY", "test-key")]).unwrap();
        assert_eq!(config.gemini_model, DEFAULT_MODEL);
        assert_eq!(config.gemini_base_url, DEFAULT_BASE_URL);
        assert_eq!(config.storage_backend, StorageBackend::Redis);
        assert_eq!(config.history_limit, 5);
        assert_eq!(config.max_image_dimension, 2048);
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = config_from(&[]).unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("GEMINI_API_KEY", "k"),
            ("STORAGE_BACKEND", "memory"),
            ("HISTORY_LIMIT", "10"),
            ("GEMINI_BASE_URL", "http://localhost:9000/"),
        ])
        .unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(config.history_limit, 10);
        assert_eq!(config.gemini_base_url, "http://localhost:9000");
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = config_from(&[("GEMINI_API_KEY", "k"), ("HISTORY_LIMIT", "five")]).unwrap_err();
        assert!(err.to_string().contains("HISTORY_LIMIT"));

        assert!(config_from(&[("GEMINI_API_KEY", "k"), ("HISTORY_LIMIT", "0")]).is_err());
        assert!(config_from(&[("GEMINI_API_KEY", "k"), ("RETENTION_SECS", "0")]).is_err());
        assert!(config_from(&[("GEMINI_API_KEY", "k"), ("REQUEST_TIMEOUT_SECS", "0")]).is_err());
        assert!(config_from(&[("GEMINI_API_KEY", "k"), ("MAX_UPLOAD_BYTES", "0")]).is_err());
        assert!(config_from(&[("GEMINI_API_KEY", "k"), ("MAX_IMAGE_DIMENSION", "0")]).is_err());
        assert!(config_from(&[("GEMINI_API_KEY", "k"), ("STORAGE_BACKEND", "sqlite")]).is_err());
    }

    #[test]
    fn json_limit_saturates_for_huge_uploads() {
        let max = usize::MAX.to_string();
        let config =
            config_from(&[("GEMINI_API_KEY", "k"), ("MAX_UPLOAD_BYTES", max.as_str())]).unwrap();
        assert_eq!(config.json_limit(), usize::MAX);

        let config = config_from(&[("GEMINI_API_KEY", "k"), ("MAX_UPLOAD_BYTES", "3000")]).unwrap();
        assert_eq!(config.json_limit(), 4000 + 64 * 1024);
    }
}
