//! The network seam used by the worker pool

use crate::uploader::error::UploadResult;
use async_trait::async_trait;
use bytes::Bytes;
use kotak_api::Client as KotakClient;
use kotak_api::api::UploadApi;
use kotak_api::models::upload::{ChunkUploadParams, UploadedFile};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Identifiers the server assigns on first contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIdentity {
    /// Remote file-record id (`_id`)
    pub record_id: String,
    /// Remote logical file id (`fileId`)
    pub file_id: String,
}

impl RemoteIdentity {
    pub fn new(record_id: impl Into<String>, file_id: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            file_id: file_id.into(),
        }
    }

    /// Both ids or nothing
    pub fn from_uploaded(file: &UploadedFile) -> Option<Self> {
        Some(Self::new(file.record_id()?, file.file_id()?))
    }
}

/// Everything one chunk request carries
#[derive(Debug, Clone)]
pub struct ChunkRequest {
    /// Chunk sequence number
    pub hash: usize,
    /// Part index
    pub part: usize,
    pub data: Bytes,
    pub filename: String,
    pub size: u64,
    pub mime_type: String,
    pub folder_id: Option<String>,
    pub total_part: usize,
    /// Unset only for the first-contact request
    pub remote: Option<RemoteIdentity>,
}

impl ChunkRequest {
    /// Query parameters in the upload endpoint's format
    pub fn params(&self) -> ChunkUploadParams {
        let (id, file_id) = match &self.remote {
            Some(remote) => (remote.record_id.clone(), remote.file_id.clone()),
            None => (String::new(), String::new()),
        };
        ChunkUploadParams {
            filename: self.filename.clone(),
            size: self.size,
            mimetype: self.mime_type.clone(),
            folder_id: self.folder_id.clone(),
            total_part: self.total_part,
            id,
            file_id,
            part: self.part,
        }
    }
}

/// Sends chunk requests to the storage service
#[async_trait]
pub trait ChunkTransport: Send + Sync {
    /// Send one chunk; returns the remote identity when the response has one
    async fn send_chunk(&self, request: ChunkRequest) -> UploadResult<Option<RemoteIdentity>>;

    /// Whether requests can be authenticated
    async fn has_credentials(&self) -> bool {
        true
    }
}

#[async_trait]
impl ChunkTransport for KotakClient {
    async fn send_chunk(&self, request: ChunkRequest) -> UploadResult<Option<RemoteIdentity>> {
        debug!(
            target: "uploader::transport",
            chunk = request.hash,
            size = request.data.len(),
            first_contact = request.remote.is_none(),
            "Uploading chunk"
        );

        let params = request.params();
        let file = self.upload_chunk(&params, request.hash, request.data).await?;
        Ok(RemoteIdentity::from_uploaded(&file))
    }

    async fn has_credentials(&self) -> bool {
        self.has_token().await
    }
}

#[async_trait]
impl<T: ChunkTransport + ?Sized> ChunkTransport for Arc<T> {
    async fn send_chunk(&self, request: ChunkRequest) -> UploadResult<Option<RemoteIdentity>> {
        (**self).send_chunk(request).await
    }

    async fn has_credentials(&self) -> bool {
        (**self).has_credentials().await
    }
}
