pub mod upload;

// Re-export for convenience
pub use upload::UploadApi;
