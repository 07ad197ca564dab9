use crate::client::Client;
use crate::error::{ApiError, ApiResult};
use crate::models::upload::{ChunkUploadParams, UploadedFile};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};

/// File upload API methods
#[async_trait]
pub trait UploadApi {
    /// Upload one chunk of a file.
    ///
    /// The first chunk of a file goes to `/file/upload` and creates the
    /// remote record; later chunks go to `/file/upload/{id}`.
    async fn upload_chunk(
        &self,
        params: &ChunkUploadParams,
        hash: usize,
        data: Bytes,
    ) -> ApiResult<UploadedFile>;
}

/// Endpoint path for a chunk request
pub fn upload_path(params: &ChunkUploadParams) -> String {
    if params.is_first_contact() {
        "/file/upload".to_string()
    } else {
        format!("/file/upload/{}", params.id)
    }
}

#[async_trait]
impl UploadApi for Client {
    async fn upload_chunk(
        &self,
        params: &ChunkUploadParams,
        hash: usize,
        data: Bytes,
    ) -> ApiResult<UploadedFile> {
        let token = self.get_access_token().await?;
        let url = self.build_url(&upload_path(params));

        let len = data.len() as u64;
        let mut chunk = Part::stream_with_length(data, len).file_name(params.filename.clone());
        if !params.mimetype.is_empty() {
            chunk = chunk.mime_str(&params.mimetype)?;
        }
        let form = Form::new()
            .text("filename", params.filename.clone())
            .text("hash", hash.to_string())
            .part("chunk", chunk);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .query(params)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::from_status(status.as_u16(), body));
        }

        Ok(serde_json::from_str(&body)?)
    }
}
