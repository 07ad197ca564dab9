//! Registry of the files uploaded during one client's lifetime

use crate::events::EventBroadcaster;
use crate::uploader::error::{UploadError, UploadResult};
use crate::uploader::progress::{ChunkEvent, ProgressCallback, RecordPatch};
use crate::uploader::source::UploadSource;
use crate::uploader::transport::RemoteIdentity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Stable handle of one submitted file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UploadId(usize);

impl UploadId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position in submission order
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of an upload record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Init,
    Uploading,
    Finished,
    Error,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Init => "init",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Finished => "finished",
            UploadStatus::Error => "error",
        }
    }
}

/// Caller-visible state of one file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    pub id: UploadId,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub folder_id: Option<String>,
    pub status: UploadStatus,
    pub total_part: usize,
    /// Resume offset: every chunk below this index is acknowledged
    pub parts_uploaded: usize,
    /// 0 to 100
    pub progress: f64,
    pub remote: Option<RemoteIdentity>,
    pub error_reason: Option<String>,
}

impl UploadRecord {
    pub fn new(
        id: UploadId,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
        folder_id: Option<String>,
        total_part: usize,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            mime_type: mime_type.into(),
            size,
            folder_id,
            status: UploadStatus::Init,
            total_part,
            parts_uploaded: 0,
            progress: 0.0,
            remote: None,
            error_reason: None,
        }
    }
}

/// What a worker needs to drive one file
pub(crate) struct UploadRun {
    pub record: UploadRecord,
    pub source: Arc<dyn UploadSource>,
    pub cancel_token: CancellationToken,
    pub generation: u64,
}

struct Entry {
    record: UploadRecord,
    source: Arc<dyn UploadSource>,
    callback: Option<Arc<dyn ProgressCallback>>,
    cancel_token: CancellationToken,
    /// Generation of the worker currently driving this entry
    active_run: Option<u64>,
}

#[derive(Default)]
struct SessionInner {
    /// Indexed by `UploadId`; evicted entries leave `None` so ids stay stable
    entries: Vec<Option<Entry>>,
    next_generation: u64,
}

impl SessionInner {
    fn live_records(&self) -> Vec<UploadRecord> {
        self.entries
            .iter()
            .flatten()
            .map(|entry| entry.record.clone())
            .collect()
    }

    fn entry_mut(&mut self, id: UploadId) -> UploadResult<&mut Entry> {
        self.entries
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(UploadError::UnknownUpload(id.index()))
    }
}

/// Insertion-ordered set of upload records owned by one client instance
pub struct UploadSession {
    inner: Mutex<SessionInner>,
    events: EventBroadcaster,
}

impl UploadSession {
    pub fn new(events: EventBroadcaster) -> Self {
        Self {
            inner: Mutex::new(SessionInner::default()),
            events,
        }
    }

    /// Event broadcaster fed by this session
    pub fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    /// Append a record for `source` and notify its callback
    pub async fn insert(
        &self,
        source: Arc<dyn UploadSource>,
        folder_id: Option<String>,
        total_part: usize,
        callback: Option<Arc<dyn ProgressCallback>>,
    ) -> UploadId {
        let (record, records) = {
            let mut inner = self.inner.lock().await;
            let id = UploadId::new(inner.entries.len());
            let record = UploadRecord::new(
                id,
                source.name(),
                source.mime_type(),
                source.size(),
                folder_id,
                total_part,
            );
            inner.entries.push(Some(Entry {
                record: record.clone(),
                source,
                callback: callback.clone(),
                cancel_token: CancellationToken::new(),
                active_run: None,
            }));
            (record, inner.live_records())
        };

        debug!(
            target: "uploader::session",
            upload_id = %record.id,
            name = %record.name,
            size = record.size,
            total_part,
            "Upload queued"
        );
        self.events
            .upload_queued(record.id.index(), record.name.clone(), total_part);
        if let Some(callback) = callback {
            callback.on_progress(&records);
        }
        record.id
    }

    /// Claim the entry for a new worker.
    ///
    /// Fails when the id is not live or another worker still drives it.
    pub(crate) async fn begin_run(&self, id: UploadId) -> UploadResult<UploadRun> {
        let mut inner = self.inner.lock().await;
        inner.next_generation += 1;
        let generation = inner.next_generation;
        let entry = inner.entry_mut(id)?;
        if entry.active_run.is_some() {
            return Err(UploadError::AlreadyRunning(id.index()));
        }
        entry.active_run = Some(generation);
        entry.cancel_token = CancellationToken::new();

        Ok(UploadRun {
            record: entry.record.clone(),
            source: Arc::clone(&entry.source),
            cancel_token: entry.cancel_token.clone(),
            generation,
        })
    }

    /// Release the entry if `generation` still owns it
    pub(crate) async fn end_run(&self, id: UploadId, generation: u64) {
        let mut inner = self.inner.lock().await;
        if let Ok(entry) = inner.entry_mut(id) {
            if entry.active_run == Some(generation) {
                entry.active_run = None;
            }
        }
    }

    /// Apply a chunk event to a record.
    ///
    /// Returns `false` when the record is no longer live, in which case
    /// nothing is written or reported.
    pub async fn report(&self, id: UploadId, event: &ChunkEvent) -> bool {
        let (record, callback, records) = {
            let mut inner = self.inner.lock().await;
            let Some(entry) = inner.entries.get_mut(id.index()).and_then(Option::as_mut) else {
                return false;
            };

            let patch = RecordPatch::from_event(&entry.record, event);
            patch.apply_to(&mut entry.record);
            let record = entry.record.clone();
            let callback = entry.callback.clone();
            if matches!(event, ChunkEvent::Failed { .. }) {
                entry.active_run = None;
            }

            // the finishing event is still visible to the caller
            let records = inner.live_records();
            if record.status == UploadStatus::Finished {
                inner.entries[id.index()] = None;
            }
            (record, callback, records)
        };

        match event {
            ChunkEvent::Started => {
                self.events
                    .upload_started(id.index(), record.parts_uploaded);
            }
            ChunkEvent::Completed { .. } if record.status == UploadStatus::Finished => {
                info!(
                    target: "uploader::session",
                    upload_id = %id,
                    name = %record.name,
                    "Upload finished"
                );
                self.events.upload_finished(id.index(), record.name.clone());
            }
            ChunkEvent::Completed { .. } => {
                self.events
                    .upload_progress(id.index(), record.progress, record.parts_uploaded);
            }
            ChunkEvent::Failed { reason } => {
                warn!(
                    target: "uploader::session",
                    upload_id = %id,
                    parts_uploaded = record.parts_uploaded,
                    error = %reason,
                    "Upload failed"
                );
                self.events.upload_failed(id.index(), reason.clone());
            }
        }

        if let Some(callback) = callback {
            callback.on_progress(&records);
        }
        true
    }

    /// Evict a record and stop its worker from dispatching more chunks
    pub async fn remove(&self, id: UploadId) -> UploadResult<UploadRecord> {
        let (entry, records) = {
            let mut inner = self.inner.lock().await;
            let entry = inner
                .entries
                .get_mut(id.index())
                .and_then(Option::take)
                .ok_or(UploadError::UnknownUpload(id.index()))?;
            (entry, inner.live_records())
        };

        entry.cancel_token.cancel();
        info!(
            target: "uploader::session",
            upload_id = %id,
            name = %entry.record.name,
            "Upload removed"
        );
        self.events.upload_removed(id.index());
        if let Some(callback) = &entry.callback {
            callback.on_progress(&records);
        }
        Ok(entry.record)
    }

    /// Snapshot of one live record
    pub async fn record(&self, id: UploadId) -> Option<UploadRecord> {
        let inner = self.inner.lock().await;
        inner
            .entries
            .get(id.index())
            .and_then(Option::as_ref)
            .map(|entry| entry.record.clone())
    }

    /// Snapshot of every live record in submission order
    pub async fn live_records(&self) -> Vec<UploadRecord> {
        self.inner.lock().await.live_records()
    }

    /// Whether a worker currently drives `id`
    pub async fn is_running(&self, id: UploadId) -> bool {
        let inner = self.inner.lock().await;
        inner
            .entries
            .get(id.index())
            .and_then(Option::as_ref)
            .is_some_and(|entry| entry.active_run.is_some())
    }
}

impl Default for UploadSession {
    fn default() -> Self {
        Self::new(EventBroadcaster::default())
    }
}
