pub mod client;
pub mod config;
pub mod events;
pub mod logging;
pub mod uploader;

// Re-export commonly used types
pub use client::{UploadTask, Uploader};
pub use config::{ClientOptions, LogLevel, UploaderConfig};
pub use events::{Event, EventBroadcaster};
pub use logging::{LogConfig, LogGuard, init_logging};
pub use uploader::{
    LocalFile, MemorySource, ProgressCallback, UploadError, UploadId, UploadRecord, UploadResult,
    UploadSource, UploadStatus,
};
