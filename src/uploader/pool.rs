//! Per-file worker driving the chunk sequence through the transport

use crate::config::UploaderConfig;
use crate::uploader::chunk::{Chunk, split};
use crate::uploader::error::{UploadError, UploadResult};
use crate::uploader::progress::ChunkEvent;
use crate::uploader::retry::retry;
use crate::uploader::session::{UploadId, UploadRecord, UploadRun, UploadSession};
use crate::uploader::source::UploadSource;
use crate::uploader::transport::{ChunkRequest, ChunkTransport, RemoteIdentity};
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Tracks which chunks the server acknowledged.
///
/// The offset is the lowest index not yet acknowledged, so every chunk below
/// it is safe to skip on resume even when completions arrive out of order.
#[derive(Debug, Clone, Default)]
pub struct ResumeCursor {
    offset: usize,
    ahead: BTreeSet<usize>,
    finished: usize,
}

impl ResumeCursor {
    /// Start with chunks `0..offset` already acknowledged
    pub fn new(offset: usize) -> Self {
        Self {
            offset,
            ahead: BTreeSet::new(),
            finished: offset,
        }
    }

    pub fn confirm(&mut self, index: usize) {
        if index < self.offset || !self.ahead.insert(index) {
            return;
        }
        self.finished += 1;
        while self.ahead.remove(&self.offset) {
            self.offset += 1;
        }
    }

    /// Lowest unacknowledged index
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Acknowledged chunks, including the skipped prefix
    pub fn finished(&self) -> usize {
        self.finished
    }
}

/// Per-file fields repeated on every chunk request
struct FileHeader {
    filename: String,
    size: u64,
    mime_type: String,
    folder_id: Option<String>,
    total_part: usize,
}

impl FileHeader {
    fn request(&self, chunk: &Chunk, data: Bytes, remote: Option<RemoteIdentity>) -> ChunkRequest {
        ChunkRequest {
            hash: chunk.index,
            part: chunk.index,
            data,
            filename: self.filename.clone(),
            size: self.size,
            mime_type: self.mime_type.clone(),
            folder_id: self.folder_id.clone(),
            total_part: self.total_part,
            remote,
        }
    }
}

/// Drives one file's chunks with at most `max_pool` requests in flight
pub struct WorkerPool {
    id: UploadId,
    session: Arc<UploadSession>,
    transport: Arc<dyn ChunkTransport>,
    config: UploaderConfig,
    source: Arc<dyn UploadSource>,
    cancel_token: CancellationToken,
}

impl WorkerPool {
    pub fn new(
        id: UploadId,
        session: Arc<UploadSession>,
        transport: Arc<dyn ChunkTransport>,
        config: UploaderConfig,
        source: Arc<dyn UploadSource>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            id,
            session,
            transport,
            config,
            source,
            cancel_token,
        }
    }

    /// Upload every chunk from the record's resume offset onwards
    pub async fn run(&self, record: &UploadRecord) -> UploadResult<()> {
        let chunks = split(self.source.size(), self.config.chunk_size);
        if chunks.is_empty() {
            return Err(UploadError::EmptyFile);
        }
        let total = chunks.len();
        let start = record.parts_uploaded.min(total);
        let mut cursor = ResumeCursor::new(start);
        let mut pending = chunks.into_iter().skip(start);
        let header = FileHeader {
            filename: self.source.name().to_string(),
            size: self.source.size(),
            mime_type: self.source.mime_type().to_string(),
            folder_id: record.folder_id.clone(),
            total_part: total,
        };

        debug!(
            target: "uploader::pool",
            upload_id = %self.id,
            total,
            start,
            max_pool = self.config.max_pool,
            "Starting chunk sequence"
        );

        let remote = match record.remote.clone() {
            Some(remote) => remote,
            None => {
                let Some(first) = pending.next() else {
                    return Ok(());
                };
                let index = first.index;
                let identity = self
                    .send(&header, first, None)
                    .await?
                    .ok_or(UploadError::MissingRemoteIdentity { chunk_index: index })?;
                debug!(
                    target: "uploader::pool",
                    upload_id = %self.id,
                    record_id = %identity.record_id,
                    file_id = %identity.file_id,
                    "Remote identity assigned"
                );
                cursor.confirm(index);
                self.report_completed(index, &cursor, total, &identity).await?;
                identity
            }
        };

        let mut in_flight = FuturesUnordered::new();
        for chunk in pending {
            if self.cancel_token.is_cancelled() {
                return Err(UploadError::Cancelled);
            }
            let index = chunk.index;
            in_flight.push(self.send_indexed(&header, chunk, remote.clone()));

            if in_flight.len() >= self.config.max_pool || index + 2 == total {
                self.drain(&mut in_flight, &mut cursor, total, &remote).await?;
            }
        }
        self.drain(&mut in_flight, &mut cursor, total, &remote).await
    }

    /// Await every in-flight request, then return the first failure if any
    async fn drain<F>(
        &self,
        in_flight: &mut FuturesUnordered<F>,
        cursor: &mut ResumeCursor,
        total: usize,
        remote: &RemoteIdentity,
    ) -> UploadResult<()>
    where
        F: Future<Output = UploadResult<usize>>,
    {
        let mut failure = None;
        while let Some(result) = in_flight.next().await {
            match result {
                Ok(index) if failure.is_none() => {
                    cursor.confirm(index);
                    if let Err(e) = self.report_completed(index, cursor, total, remote).await {
                        failure = Some(e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn send_indexed(
        &self,
        header: &FileHeader,
        chunk: Chunk,
        remote: RemoteIdentity,
    ) -> UploadResult<usize> {
        let index = chunk.index;
        self.send(header, chunk, Some(remote)).await.map(|_| index)
    }

    /// Read one chunk and send it through the retry wrapper
    async fn send(
        &self,
        header: &FileHeader,
        chunk: Chunk,
        remote: Option<RemoteIdentity>,
    ) -> UploadResult<Option<RemoteIdentity>> {
        if self.cancel_token.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        let data = self.source.read_chunk(&chunk).await?;
        let request = header.request(&chunk, data, remote);
        let transport = &self.transport;

        retry(&self.config.retry, chunk.index, &self.cancel_token, move |_| {
            transport.send_chunk(request.clone())
        })
        .await
    }

    async fn report_completed(
        &self,
        index: usize,
        cursor: &ResumeCursor,
        total: usize,
        remote: &RemoteIdentity,
    ) -> UploadResult<()> {
        let event = ChunkEvent::Completed {
            index,
            finished: cursor.finished(),
            total,
            resume_offset: cursor.offset(),
            remote: Some(remote.clone()),
        };
        if self.session.report(self.id, &event).await {
            Ok(())
        } else {
            // record was removed while the request was in flight
            Err(UploadError::Cancelled)
        }
    }
}

/// Run one claimed upload to its end and report the outcome
pub(crate) async fn run_upload(
    session: Arc<UploadSession>,
    transport: Arc<dyn ChunkTransport>,
    config: UploaderConfig,
    id: UploadId,
    run: UploadRun,
) -> UploadResult<()> {
    let UploadRun {
        record,
        source,
        cancel_token,
        generation,
    } = run;

    session.report(id, &ChunkEvent::Started).await;
    let pool = WorkerPool::new(id, Arc::clone(&session), transport, config, source, cancel_token);
    let result = pool.run(&record).await;

    match &result {
        Ok(()) => {
            info!(target: "uploader::pool", upload_id = %id, "Chunk sequence complete");
        }
        Err(e) if e.is_cancelled() => {
            debug!(target: "uploader::pool", upload_id = %id, "Upload stopped");
        }
        Err(e) => {
            warn!(target: "uploader::pool", upload_id = %id, error = %e, "Upload aborted");
            session
                .report(
                    id,
                    &ChunkEvent::Failed {
                        reason: e.to_string(),
                    },
                )
                .await;
        }
    }
    session.end_run(id, generation).await;
    result
}
