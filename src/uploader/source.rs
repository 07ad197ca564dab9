//! Byte sources that can be uploaded

use crate::uploader::chunk::{Chunk, ChunkReader};
use crate::uploader::error::{UploadError, UploadResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

/// MIME type used when nothing better is known
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A file-like, byte-addressable source
#[async_trait]
pub trait UploadSource: Send + Sync {
    /// Display name sent as `filename`
    fn name(&self) -> &str;

    /// MIME type sent as `mimetype`
    fn mime_type(&self) -> &str;

    /// Total length in bytes
    fn size(&self) -> u64;

    /// Read the bytes covered by `chunk`
    async fn read_chunk(&self, chunk: &Chunk) -> UploadResult<Bytes>;
}

/// In-memory source
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    mime_type: String,
    data: Bytes,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let name = name.into();
        let mime_type = mime_guess::from_path(&name)
            .first_or_octet_stream()
            .to_string();
        Self {
            name,
            mime_type,
            data: data.into(),
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }
}

#[async_trait]
impl UploadSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn read_chunk(&self, chunk: &Chunk) -> UploadResult<Bytes> {
        if chunk.end() > self.size() {
            return Err(UploadError::FileReadError(format!(
                "range {}..{} outside of {} bytes",
                chunk.offset,
                chunk.end(),
                self.size()
            )));
        }
        Ok(self.data.slice(chunk.offset as usize..chunk.end() as usize))
    }
}

/// File on the local disk, read chunk by chunk
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    name: String,
    mime_type: String,
    size: u64,
}

impl LocalFile {
    /// Stat `path` and guess its MIME type from the extension
    pub async fn open(path: impl AsRef<Path>) -> UploadResult<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(UploadError::FileReadError(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .to_string();

        Ok(Self {
            path,
            name,
            mime_type,
            size: metadata.len(),
        })
    }

    /// Upload under a different display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl UploadSource for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn read_chunk(&self, chunk: &Chunk) -> UploadResult<Bytes> {
        let reader = ChunkReader::new(&self.path, chunk).await?;
        Ok(reader.read_all().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn memory_source_slices_chunks() {
        let source = MemorySource::new("notes.txt", &b"hello world"[..]);
        assert_eq!(source.name(), "notes.txt");
        assert_eq!(source.mime_type(), "text/plain");
        assert_eq!(source.size(), 11);

        let bytes = source.read_chunk(&Chunk::new(1, 6, 5)).await.unwrap();
        assert_eq!(&bytes[..], b"world");

        let err = source.read_chunk(&Chunk::new(2, 8, 5)).await.unwrap_err();
        assert!(matches!(err, UploadError::FileReadError(_)));
    }

    #[tokio::test]
    async fn memory_source_mime_override() {
        let source = MemorySource::new("blob", vec![1u8, 2, 3]).with_mime_type("image/png");
        assert_eq!(source.mime_type(), "image/png");
        assert_eq!(
            MemorySource::new("blob", vec![0u8]).mime_type(),
            DEFAULT_MIME_TYPE
        );
    }

    #[tokio::test]
    async fn local_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(br#"{"a":1}"#)
            .unwrap();

        let source = LocalFile::open(&path).await.unwrap();
        assert_eq!(source.name(), "report.json");
        assert_eq!(source.mime_type(), "application/json");
        assert_eq!(source.size(), 7);
        assert_eq!(source.path(), path.as_path());

        let bytes = source.read_chunk(&Chunk::new(0, 0, 7)).await.unwrap();
        assert_eq!(&bytes[..], br#"{"a":1}"#);

        let renamed = source.with_name("data.json");
        assert_eq!(renamed.name(), "data.json");
    }

    #[tokio::test]
    async fn local_file_rejects_directories_and_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            LocalFile::open(dir.path()).await,
            Err(UploadError::FileReadError(_))
        ));
        assert!(matches!(
            LocalFile::open(dir.path().join("missing.bin")).await,
            Err(UploadError::FileReadError(_))
        ));
    }
}
