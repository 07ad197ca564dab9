//! The uploader a caller holds

use crate::config::{ClientOptions, UploaderConfig};
use crate::events::{Event, EventBroadcaster};
use crate::uploader::chunk::total_parts;
use crate::uploader::error::{UploadError, UploadResult};
use crate::uploader::pool::run_upload;
use crate::uploader::progress::ProgressCallback;
use crate::uploader::session::{UploadId, UploadRecord, UploadSession};
use crate::uploader::source::UploadSource;
use crate::uploader::transport::ChunkTransport;
use kotak_api::Client as KotakClient;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Handle to one running upload worker
pub struct UploadTask {
    id: UploadId,
    handle: JoinHandle<UploadResult<()>>,
}

impl UploadTask {
    pub fn id(&self) -> UploadId {
        self.id
    }

    /// Wait for the worker to stop.
    ///
    /// Failures are also recorded on the upload record; this only mirrors them.
    pub async fn wait(self) -> UploadResult<()> {
        self.handle
            .await
            .map_err(|e| UploadError::Other(format!("Upload worker panicked: {}", e)))?
    }
}

/// Uploads files in chunks and tracks them for one client lifetime
pub struct Uploader {
    transport: Arc<dyn ChunkTransport>,
    session: Arc<UploadSession>,
    config: UploaderConfig,
}

impl Uploader {
    pub fn new(transport: Arc<dyn ChunkTransport>, config: UploaderConfig) -> Self {
        Self {
            transport,
            session: Arc::new(UploadSession::new(EventBroadcaster::default())),
            config,
        }
    }

    /// Build the API client and validate the engine settings
    pub async fn from_options(options: &ClientOptions) -> UploadResult<Self> {
        let config = options.uploader_config()?;
        let client = KotakClient::new(options.client_config())?;
        if let Some(token) = &options.token {
            client.set_token(token.clone()).await;
        }
        Ok(Self::new(Arc::new(client), config))
    }

    /// Use an existing API client
    pub fn from_client(client: Arc<KotakClient>, config: UploaderConfig) -> Self {
        Self::new(client, config)
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    /// Queue `files` and start one worker per file.
    ///
    /// Returns in submission order. Fails before any record is created when no
    /// credentials are configured.
    pub async fn submit(
        &self,
        files: Vec<Arc<dyn UploadSource>>,
        folder_id: Option<String>,
        on_progress: Option<Arc<dyn ProgressCallback>>,
    ) -> UploadResult<Vec<UploadTask>> {
        if !self.transport.has_credentials().await {
            return Err(UploadError::NotAuthenticated);
        }

        let mut ids = Vec::with_capacity(files.len());
        for source in files {
            let total_part = total_parts(source.size(), self.config.chunk_size);
            let id = self
                .session
                .insert(source, folder_id.clone(), total_part, on_progress.clone())
                .await;
            ids.push(id);
        }

        info!(
            target: "client",
            count = ids.len(),
            folder_id = ?folder_id,
            "Files submitted for upload"
        );

        let mut tasks = Vec::with_capacity(ids.len());
        for id in ids {
            tasks.push(self.spawn(id).await?);
        }
        Ok(tasks)
    }

    /// Restart a failed upload from its resume offset
    pub async fn resume(&self, id: UploadId) -> UploadResult<UploadTask> {
        if !self.transport.has_credentials().await {
            return Err(UploadError::NotAuthenticated);
        }
        debug!(target: "client", upload_id = %id, "Resuming upload");
        self.spawn(id).await
    }

    /// Drop a record; its worker stops before the next chunk
    pub async fn remove(&self, id: UploadId) -> UploadResult<UploadRecord> {
        self.session.remove(id).await
    }

    /// Snapshot of the live records in submission order
    pub async fn records(&self) -> Vec<UploadRecord> {
        self.session.live_records().await
    }

    pub async fn record(&self, id: UploadId) -> Option<UploadRecord> {
        self.session.record(id).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.session.events().subscribe()
    }

    async fn spawn(&self, id: UploadId) -> UploadResult<UploadTask> {
        let run = self.session.begin_run(id).await?;
        let handle = tokio::spawn(run_upload(
            Arc::clone(&self.session),
            Arc::clone(&self.transport),
            self.config,
            id,
            run,
        ));
        Ok(UploadTask { id, handle })
    }
}
