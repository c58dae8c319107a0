use crate::blobstore::BlobError;
use crate::url::UrlError;

/// All errors produced by the helper that are fatal to the protocol
/// session (spec §7 categories 1, 4, 5, and exhausted category-3 retries).
///
/// Compare-and-swap conflicts (`fetch first`, `non-fast forward`) and the
/// delete-current-branch refusal are *not* represented here: per spec
/// §4.5/§7 those are ordinary protocol responses, not exceptions, and are
/// returned as `Result<(), String>` from [`crate::refs`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported operation: {0}")]
    Protocol(String),

    #[error("invalid command `{0}`")]
    InvalidCommand(String),

    #[error(transparent)]
    BlobStore(#[from] BlobError),

    #[error("hash mismatch: expected {expected}, computed {actual}")]
    Integrity { expected: String, actual: String },

    #[error("unexpected git object type: {0}")]
    UnexpectedObjectKind(String),

    #[error("invalid ref name: {0}")]
    InvalidRef(String),

    #[error(transparent)]
    Url(#[from] UrlError),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker pool exhausted: {0}")]
    WorkerFailure(String),

    #[error("no token available; set GIT_REMOTE_DROPBOX_TOKEN or embed one in the URL")]
    NoToken,
}

pub type Result<T> = std::result::Result<T, Error>;
