use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;
use url::Url;

/// Default service endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.kotak.cloud";

/// Supported API versions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    #[default]
    V1,
}

impl ApiVersion {
    /// Path prefix appended to the service endpoint
    pub fn path(&self) -> &'static str {
        match self {
            ApiVersion::V1 => "/api/v1",
        }
    }
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Fully qualified API root, e.g. `https://api.kotak.cloud/api/v1`
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout: Option<u64>,
}

impl ClientConfig {
    /// Use an explicit API root
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
        }
    }

    /// Use the default endpoint with the given API version
    pub fn for_version(version: ApiVersion) -> Self {
        Self::new(format!("{}{}", DEFAULT_BASE_URL, version.path()))
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(secs);
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::for_version(ApiVersion::default())
    }
}

/// Kotak Cloud API client
///
/// Holds the HTTP connection pool and the bearer token attached to every
/// authenticated request.
pub struct Client {
    config: ClientConfig,
    pub(crate) http_client: reqwest::Client,
    token: RwLock<Option<String>>,
}

impl Client {
    /// Create a new client
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        Url::parse(&config.base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;

        let mut builder = reqwest::Client::builder().tcp_keepalive(Duration::from_secs(60));
        if let Some(secs) = config.timeout {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http_client = builder.build()?;

        Ok(Self {
            config,
            http_client,
            token: RwLock::new(None),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Store the bearer token used for subsequent requests.
    ///
    /// An empty string clears the token.
    pub async fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        *self.token.write().await = if token.is_empty() { None } else { Some(token) };
    }

    /// Forget the stored token
    pub async fn clear_token(&self) {
        *self.token.write().await = None;
    }

    /// Current token, if any
    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// Whether a token is configured
    pub async fn has_token(&self) -> bool {
        self.token.read().await.is_some()
    }

    pub(crate) async fn get_access_token(&self) -> ApiResult<String> {
        self.token().await.ok_or(ApiError::MissingToken)
    }

    /// Join an API path onto the base URL
    pub fn build_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
