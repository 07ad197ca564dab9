//! Client options and their on-disk JSON form

use crate::uploader::chunk::{ChunkSize, DEFAULT_CHUNK_SIZE_KB};
use crate::uploader::error::{UploadError, UploadResult};
use crate::uploader::retry::{DEFAULT_MAX_RETRY, DEFAULT_RETRY_MAX_DELAY_MS, RetryPolicy};
use anyhow::{Context, Result};
use kotak_api::{ApiVersion, ClientConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of chunk requests in flight per file
pub const DEFAULT_MAX_POOL: usize = 3;

/// Name of the options file inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Options accepted when building an uploader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Explicit base URL; the default service is used when unset
    pub url: Option<String>,
    pub api_version: ApiVersion,
    /// Bearer token attached to every request
    pub token: Option<String>,
    pub max_retry: u32,
    pub max_pool: usize,
    /// Chunk size in KB (1..=512)
    pub chunk_size: u64,
    /// First retry delay; zero retries immediately
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
    pub log_level: LogLevel,
    pub log_to_file: bool,
    pub log_max_files: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            url: None,
            api_version: ApiVersion::default(),
            token: None,
            max_retry: DEFAULT_MAX_RETRY,
            max_pool: DEFAULT_MAX_POOL,
            chunk_size: DEFAULT_CHUNK_SIZE_KB,
            retry_base_delay_ms: 0,
            retry_max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            timeout_secs: None,
            log_level: LogLevel::default(),
            log_to_file: false,
            log_max_files: 5,
        }
    }
}

impl ClientOptions {
    /// Read options from a JSON file; missing fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let options = serde_json::from_str(&content).context("Failed to parse client config")?;
        Ok(options)
    }

    /// Read options from `path`, falling back to defaults when it does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Write options as pretty JSON, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize client config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Connection settings for the API client
    pub fn client_config(&self) -> ClientConfig {
        let mut config = match &self.url {
            Some(url) => ClientConfig::new(url.clone()),
            None => ClientConfig::for_version(self.api_version),
        };
        if let Some(timeout) = self.timeout_secs {
            config = config.with_timeout(timeout);
        }
        config
    }

    /// Validate the engine settings
    pub fn uploader_config(&self) -> UploadResult<UploaderConfig> {
        let retry = RetryPolicy {
            max_retry: self.max_retry,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        };
        UploaderConfig::new(self.chunk_size, self.max_pool, retry)
    }
}

/// Validated settings of the upload engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploaderConfig {
    pub chunk_size: ChunkSize,
    pub max_pool: usize,
    pub retry: RetryPolicy,
}

impl UploaderConfig {
    pub fn new(chunk_size_kb: u64, max_pool: usize, retry: RetryPolicy) -> UploadResult<Self> {
        let chunk_size = ChunkSize::from_kb(chunk_size_kb)?;
        if max_pool == 0 {
            return Err(UploadError::InvalidPoolSize(max_pool));
        }
        Ok(Self {
            chunk_size,
            max_pool,
            retry,
        })
    }
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: ChunkSize::default(),
            max_pool: DEFAULT_MAX_POOL,
            retry: RetryPolicy::default(),
        }
    }
}

/// `~/.kotak`
pub fn default_config_dir() -> Result<PathBuf> {
    let home_dir = dirs::home_dir().context("Failed to get user home directory")?;
    Ok(home_dir.join(".kotak"))
}

/// `~/.kotak/config.json`
pub fn default_config_file() -> Result<PathBuf> {
    Ok(default_config_dir()?.join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_defaults() {
        let options = ClientOptions::default();
        assert_eq!(options.max_retry, 3);
        assert_eq!(options.max_pool, 3);
        assert_eq!(options.chunk_size, 512);

        let config = options.uploader_config().unwrap();
        assert_eq!(config, UploaderConfig::default());
        assert_eq!(config.chunk_size.bytes(), 512 * 1024);
        assert!(config.retry.base_delay.is_zero());
    }

    #[test]
    fn rejects_out_of_range_settings() {
        let options = ClientOptions {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            options.uploader_config(),
            Err(UploadError::InvalidChunkSize(0))
        ));

        let options = ClientOptions {
            chunk_size: 600,
            ..Default::default()
        };
        assert!(matches!(
            options.uploader_config(),
            Err(UploadError::InvalidChunkSize(600))
        ));

        let options = ClientOptions {
            max_pool: 0,
            ..Default::default()
        };
        assert!(matches!(
            options.uploader_config(),
            Err(UploadError::InvalidPoolSize(0))
        ));
    }

    #[test]
    fn save_and_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let options = ClientOptions {
            token: Some("secret".into()),
            chunk_size: 256,
            retry_base_delay_ms: 250,
            ..Default::default()
        };
        options.save(&path).unwrap();

        let loaded = ClientOptions::load(&path).unwrap();
        assert_eq!(loaded, options);

        let config = loaded.uploader_config().unwrap();
        assert_eq!(config.chunk_size.kb(), 256);
        assert_eq!(config.retry.base_delay, Duration::from_millis(250));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{"max_pool": 5, "log_level": "debug"}"#).unwrap();

        let loaded = ClientOptions::load(&path).unwrap();
        assert_eq!(loaded.max_pool, 5);
        assert_eq!(loaded.max_retry, 3);
        assert_eq!(loaded.log_level, LogLevel::Debug);

        let missing = ClientOptions::load_or_default(dir.path().join("missing.json")).unwrap();
        assert_eq!(missing, ClientOptions::default());
        assert!(ClientOptions::load(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn explicit_url_overrides_version() {
        let options = ClientOptions {
            url: Some("http://localhost:8080/api".into()),
            timeout_secs: Some(10),
            ..Default::default()
        };
        let config = options.client_config();
        assert_eq!(config.base_url, "http://localhost:8080/api");
        assert_eq!(config.timeout, Some(10));
    }
}
