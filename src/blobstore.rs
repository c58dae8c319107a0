//! BlobStore client contract (spec §4.2, §6).
//!
//! This module defines the interface the core consumes; the concrete SDK
//! for any particular cloud provider is an external collaborator (spec
//! §1) and out of scope here. `tests/common` provides an in-memory
//! implementation used by the test suite.

use thiserror::Error;

use crate::types::Revision;

/// Errors a [`BlobStore`] operation can fail with.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A conditional write (`Add` or `Update`) lost a race, or the file was
    /// not in the expected prior state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Retriable server-side failure (spec §7 category 3).
    #[error("transient server error: {0}")]
    Transient(String),

    /// A chunked-upload append landed at the wrong offset; the store
    /// reports the offset the client should resume from.
    #[error("upload session offset mismatch, resume at {correct_offset}")]
    OffsetMismatch { correct_offset: u64 },
}

/// How a write should be applied relative to the file's current state.
#[derive(Debug, Clone)]
pub enum UploadMode {
    /// Succeed only if the path does not currently exist.
    Add,
    /// Unconditional write, regardless of what is there.
    Overwrite,
    /// Succeed only if the current revision equals the given one.
    Update(Revision),
}

/// Metadata for one file returned by [`BlobStore::list_folder`].
#[derive(Debug, Clone)]
pub struct FileMetadata {
    /// Lower-cased path, as the store's case-insensitive namespace returns
    /// it.
    pub path_lower: String,
    pub rev: Revision,
}

/// An in-progress chunked upload session (spec §4.2).
#[derive(Clone)]
pub struct UploadCursor {
    pub session_id: Option<String>,
    pub offset: u64,
}

impl UploadCursor {
    pub fn new() -> Self {
        Self {
            session_id: None,
            offset: 0,
        }
    }
}

impl Default for UploadCursor {
    fn default() -> Self {
        Self::new()
    }
}

/// Thin abstraction over a cloud file-sync store (spec §4.2, §6).
///
/// Every operation is independent; no long-lived session is required.
/// Implementations must be safe to call concurrently from multiple workers
/// (spec §4.2: "Concurrency: one logical connection per worker... the
/// contract is that all operations are thread-safe in aggregate").
pub trait BlobStore: Send + Sync {
    /// Download a file's content and its current revision.
    fn download(&self, path: &str) -> Result<(Revision, Vec<u8>), BlobError>;

    /// Write a file in its entirety, subject to `mode`.
    fn upload(&self, path: &str, data: &[u8], mode: UploadMode) -> Result<Revision, BlobError>;

    /// Start a chunked upload session with the first chunk of data.
    fn start_upload_session(&self, chunk: &[u8]) -> Result<UploadCursor, BlobError>;

    /// Append an intermediate chunk to an in-progress session.
    fn append_upload_session(
        &self,
        cursor: &mut UploadCursor,
        chunk: &[u8],
    ) -> Result<(), BlobError>;

    /// Commit the final chunk of a session to `path`, subject to `mode`.
    fn finish_upload_session(
        &self,
        cursor: UploadCursor,
        path: &str,
        chunk: &[u8],
        mode: UploadMode,
    ) -> Result<Revision, BlobError>;

    /// List every file under `path`. When `recursive` is true, descend into
    /// subfolders; non-file entries are ignored. Implementations page
    /// internally and return the fully materialized list.
    fn list_folder(&self, path: &str, recursive: bool) -> Result<Vec<FileMetadata>, BlobError>;

    /// Delete a file. Deleting an already-absent path is not an error.
    fn delete(&self, path: &str) -> Result<(), BlobError>;
}
