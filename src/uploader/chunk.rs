//! Chunk partitioning and ranged reads

use crate::uploader::error::{UploadError, UploadResult};
use bytes::Bytes;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, BufReader, ReadBuf, SeekFrom, Take};

/// Largest chunk the upload endpoint accepts, in KB
pub const MAX_CHUNK_SIZE_KB: u64 = 512;

/// Chunk size used when none is configured, in KB
pub const DEFAULT_CHUNK_SIZE_KB: u64 = 512;

/// Buffer size for ranged reads (64KB)
const STREAM_BUFFER_SIZE: usize = 64 * 1024;

/// Validated chunk size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSize(u64);

impl ChunkSize {
    /// Accepts sizes in `1..=512` KB
    pub fn from_kb(kb: u64) -> UploadResult<Self> {
        if kb == 0 || kb > MAX_CHUNK_SIZE_KB {
            return Err(UploadError::InvalidChunkSize(kb));
        }
        Ok(Self(kb))
    }

    pub fn kb(&self) -> u64 {
        self.0
    }

    pub fn bytes(&self) -> u64 {
        self.0 * 1024
    }
}

impl Default for ChunkSize {
    fn default() -> Self {
        Self(DEFAULT_CHUNK_SIZE_KB)
    }
}

/// One contiguous byte range of a file, tagged with its sequence index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Sequence index, sent to the server as `hash`
    pub index: usize,
    /// Byte offset in file
    pub offset: u64,
    /// Length of the range
    pub size: u64,
}

impl Chunk {
    /// Create new chunk info
    pub fn new(index: usize, offset: u64, size: u64) -> Self {
        Self {
            index,
            offset,
            size,
        }
    }

    /// Exclusive end offset
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Number of chunks needed for `size` bytes
pub fn total_parts(size: u64, chunk_size: ChunkSize) -> usize {
    size.div_ceil(chunk_size.bytes()) as usize
}

/// Partition `size` bytes into chunks of `chunk_size`, the last one truncated.
///
/// Deterministic: the same inputs always yield the same sequence, which is
/// what lets a resumed upload skip chunks by index.
pub fn split(size: u64, chunk_size: ChunkSize) -> Vec<Chunk> {
    let step = chunk_size.bytes();
    let mut chunks = Vec::with_capacity(total_parts(size, chunk_size));
    let mut offset = 0;
    while offset < size {
        let len = step.min(size - offset);
        chunks.push(Chunk::new(chunks.len(), offset, len));
        offset += len;
    }
    chunks
}

/// Async reader limited to one chunk's byte range of a local file
pub struct ChunkReader {
    inner: Take<BufReader<File>>,
    size: u64,
}

impl ChunkReader {
    /// Open `path` positioned at the start of `chunk`
    pub async fn new(path: &Path, chunk: &Chunk) -> io::Result<Self> {
        let file = File::open(path).await?;
        let mut reader = BufReader::with_capacity(STREAM_BUFFER_SIZE, file);
        reader.seek(SeekFrom::Start(chunk.offset)).await?;

        Ok(Self {
            inner: reader.take(chunk.size),
            size: chunk.size,
        })
    }

    /// Get the total size of this chunk
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read the whole range into memory.
    ///
    /// Fails with `UnexpectedEof` when the file shrank below the range.
    pub async fn read_all(mut self) -> io::Result<Bytes> {
        let mut buf = Vec::with_capacity(self.size as usize);
        self.read_to_end(&mut buf).await?;
        if (buf.len() as u64) < self.size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes, read {}", self.size, buf.len()),
            ));
        }
        Ok(Bytes::from(buf))
    }
}

impl AsyncRead for ChunkReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn kb(n: u64) -> ChunkSize {
        ChunkSize::from_kb(n).unwrap()
    }

    #[test]
    fn rejects_out_of_range_sizes() {
        assert!(matches!(
            ChunkSize::from_kb(0),
            Err(UploadError::InvalidChunkSize(0))
        ));
        assert!(matches!(
            ChunkSize::from_kb(600),
            Err(UploadError::InvalidChunkSize(600))
        ));
        assert_eq!(kb(1).bytes(), 1024);
        assert_eq!(kb(512).bytes(), 512 * 1024);
        assert_eq!(ChunkSize::default().kb(), 512);
    }

    #[test]
    fn exact_multiple_splits_evenly() {
        let chunks = split(1536 * 1024, kb(512));
        assert_eq!(chunks.len(), 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.size, 512 * 1024);
            assert_eq!(chunk.offset, i as u64 * 512 * 1024);
        }
    }

    #[test]
    fn last_chunk_is_truncated() {
        let size = 2 * 1024 + 100;
        let chunks = split(size, kb(1));
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], Chunk::new(2, 2048, 100));
        assert_eq!(chunks.len(), total_parts(size, kb(1)));
    }

    #[test]
    fn sizes_sum_to_file_size_and_ranges_are_contiguous() {
        for size in [1u64, 1023, 1024, 1025, 10_000, 524_288, 1_000_001] {
            for chunk_kb in [1u64, 3, 64, 512] {
                let chunks = split(size, kb(chunk_kb));
                let total: u64 = chunks.iter().map(|c| c.size).sum();
                assert_eq!(total, size);
                assert_eq!(chunks.len(), total_parts(size, kb(chunk_kb)));
                for pair in chunks.windows(2) {
                    assert_eq!(pair[0].end(), pair[1].offset);
                    assert_eq!(pair[0].index + 1, pair[1].index);
                }
            }
        }
    }

    #[test]
    fn splitting_is_idempotent() {
        let first = split(777_777, kb(7));
        let second = split(777_777, kb(7));
        assert_eq!(first, second);
    }

    #[test]
    fn empty_source_has_no_chunks() {
        assert!(split(0, kb(512)).is_empty());
        assert_eq!(total_parts(0, kb(512)), 0);
    }

    #[tokio::test]
    async fn chunk_reader_reads_exact_range() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"AABBCCDDEE").unwrap();

        let reader = ChunkReader::new(file.path(), &Chunk::new(1, 4, 4))
            .await
            .unwrap();
        assert_eq!(reader.size(), 4);
        assert_eq!(&reader.read_all().await.unwrap()[..], b"CCDD");

        let tail = ChunkReader::new(file.path(), &Chunk::new(2, 8, 2))
            .await
            .unwrap();
        assert_eq!(&tail.read_all().await.unwrap()[..], b"EE");
    }

    #[tokio::test]
    async fn chunk_reader_reports_short_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123").unwrap();

        let reader = ChunkReader::new(file.path(), &Chunk::new(0, 2, 8))
            .await
            .unwrap();
        let err = reader.read_all().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
