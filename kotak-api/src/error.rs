use thiserror::Error;

/// Result type for API calls
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by the Kotak Cloud API client
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (connect, timeout, body)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// No bearer token has been configured
    #[error("No access token configured, login or set a token first")]
    MissingToken,

    /// Base URL could not be parsed
    #[error("Invalid base URL: {0}")]
    InvalidUrl(String),

    #[error("{0}")]
    Other(String),
}

impl ApiError {
    /// Build an error from a non-success HTTP response body
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message.or(b.error))
            .unwrap_or(body);
        ApiError::Status { status, message }
    }
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}
