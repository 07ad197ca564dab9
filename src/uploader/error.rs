//! Error types for the uploader module

use kotak_api::ApiError;
use thiserror::Error;

/// Result type for upload operations
pub type UploadResult<T> = Result<T, UploadError>;

/// Upload error types
#[derive(Debug, Error)]
pub enum UploadError {
    /// Chunk size outside 1..=512 KB
    #[error("Invalid chunk size {0} KB: must be between 1 and 512 KB")]
    InvalidChunkSize(u64),

    /// Pool size of zero
    #[error("Invalid pool size {0}: at least one request must be allowed in flight")]
    InvalidPoolSize(usize),

    /// No bearer token configured on the API client
    #[error("You need to login or set a token first")]
    NotAuthenticated,

    /// Upload was cancelled
    #[error("Upload cancelled")]
    Cancelled,

    /// Failed to read local file
    #[error("Failed to read local file: {0}")]
    FileReadError(String),

    /// Zero-byte sources have no chunk to carry them
    #[error("Empty files cannot be uploaded")]
    EmptyFile,

    /// Chunk upload failed
    #[error("Chunk {chunk_index} upload failed: {message}")]
    ChunkUploadFailed { chunk_index: usize, message: String },

    /// First chunk answered without a record id or file id
    #[error("Server response for chunk {chunk_index} is missing the remote file identity")]
    MissingRemoteIdentity { chunk_index: usize },

    /// Request rejected by the API client before or after sending
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Handle does not name a live upload
    #[error("No live upload with id {0}")]
    UnknownUpload(usize),

    /// A worker for this upload is still running
    #[error("Upload {0} is already running")]
    AlreadyRunning(usize),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl UploadError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            UploadError::ChunkUploadFailed { .. } => true,
            UploadError::Api(e) => !matches!(e, ApiError::MissingToken | ApiError::InvalidUrl(_)),
            _ => false,
        }
    }

    /// Check if this error is due to cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, UploadError::Cancelled)
    }

    /// Create a chunk upload error
    pub fn chunk_failed(chunk_index: usize, message: impl Into<String>) -> Self {
        UploadError::ChunkUploadFailed {
            chunk_index,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        UploadError::FileReadError(err.to_string())
    }
}
