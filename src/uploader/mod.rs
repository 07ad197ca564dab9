//! Chunked upload engine
//!
//! Files are split into fixed-size chunks and sent through a [`ChunkTransport`].
//! The first chunk of a file is sent alone to obtain its remote identity; the
//! rest go out with at most `max_pool` requests in flight. Every acknowledged
//! chunk updates the file's [`UploadRecord`] in the [`UploadSession`].

pub mod chunk;
pub mod error;
pub mod pool;
pub mod progress;
pub mod retry;
pub mod session;
pub mod source;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use chunk::{Chunk, ChunkReader, ChunkSize, MAX_CHUNK_SIZE_KB};
pub use error::{UploadError, UploadResult};
pub use pool::{ResumeCursor, WorkerPool};
pub use progress::{ChunkEvent, FnProgress, NoOpProgress, ProgressCallback, RecordPatch};
pub use retry::RetryPolicy;
pub use session::{UploadId, UploadRecord, UploadSession, UploadStatus};
pub use source::{LocalFile, MemorySource, UploadSource};
pub use transport::{ChunkRequest, ChunkTransport, RemoteIdentity};
