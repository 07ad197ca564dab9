//! Progress reporting for uploads

use crate::uploader::session::{UploadRecord, UploadStatus};
use crate::uploader::transport::RemoteIdentity;
use std::sync::Arc;

/// Something that happened to one file's chunk sequence
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkEvent {
    /// A worker started (or resumed) driving the file
    Started,
    /// A chunk was acknowledged by the server
    Completed {
        /// Index of the acknowledged chunk
        index: usize,
        /// Chunks acknowledged so far, including those skipped on resume
        finished: usize,
        /// Total chunks of the file
        total: usize,
        /// Lowest index not yet acknowledged
        resume_offset: usize,
        /// Identity assigned by the first chunk
        remote: Option<RemoteIdentity>,
    },
    /// The file's remaining sequence was abandoned
    Failed { reason: String },
}

/// Fields of a record changed by one event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub status: Option<UploadStatus>,
    pub progress: Option<f64>,
    pub parts_uploaded: Option<usize>,
    pub remote: Option<RemoteIdentity>,
    /// `Some(None)` clears a previous error
    pub error_reason: Option<Option<String>>,
}

impl RecordPatch {
    /// Map an event and the record's prior state to the fields it changes
    pub fn from_event(prior: &UploadRecord, event: &ChunkEvent) -> Self {
        match event {
            ChunkEvent::Started => Self {
                status: Some(UploadStatus::Uploading),
                error_reason: Some(None),
                ..Default::default()
            },
            ChunkEvent::Completed {
                finished,
                total,
                resume_offset,
                remote,
                ..
            } => {
                let status = if prior.status == UploadStatus::Error {
                    // a late completion never revives a failed record
                    UploadStatus::Error
                } else if finished == total {
                    UploadStatus::Finished
                } else {
                    UploadStatus::Uploading
                };
                let progress = if *total > 0 {
                    *finished as f64 / *total as f64 * 100.0
                } else {
                    100.0
                };
                // never below what a previous run already showed
                let progress = match status {
                    UploadStatus::Error => None,
                    _ => Some(progress.max(prior.progress)),
                };
                Self {
                    status: Some(status),
                    progress,
                    parts_uploaded: Some(*resume_offset),
                    remote: if prior.remote.is_none() {
                        remote.clone()
                    } else {
                        None
                    },
                    error_reason: None,
                }
            }
            ChunkEvent::Failed { reason } => Self {
                status: Some(UploadStatus::Error),
                error_reason: Some(Some(reason.clone())),
                ..Default::default()
            },
        }
    }

    /// Write the changed fields into `record`
    pub fn apply_to(&self, record: &mut UploadRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(progress) = self.progress {
            record.progress = progress;
        }
        if let Some(parts) = self.parts_uploaded {
            record.parts_uploaded = parts;
        }
        if let Some(remote) = &self.remote {
            record.remote = Some(remote.clone());
        }
        if let Some(reason) = &self.error_reason {
            record.error_reason = reason.clone();
        }
    }
}

/// Trait for receiving progress updates
pub trait ProgressCallback: Send + Sync {
    /// Called with every live record after each record change
    fn on_progress(&self, records: &[UploadRecord]);
}

/// No-op progress callback implementation
pub struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _records: &[UploadRecord]) {}
}

/// Closure-based progress callback
pub struct FnProgress<F>(pub F);

impl<F> ProgressCallback for FnProgress<F>
where
    F: Fn(&[UploadRecord]) + Send + Sync,
{
    fn on_progress(&self, records: &[UploadRecord]) {
        (self.0)(records)
    }
}

/// Arc wrapper for progress callbacks
impl<T: ProgressCallback + ?Sized> ProgressCallback for Arc<T> {
    fn on_progress(&self, records: &[UploadRecord]) {
        (**self).on_progress(records)
    }
}

/// Box wrapper for progress callbacks
impl ProgressCallback for Box<dyn ProgressCallback> {
    fn on_progress(&self, records: &[UploadRecord]) {
        (**self).on_progress(records)
    }
}
