//! A Git remote helper that uses a cloud blob store as the remote repository.
//!
//! `git-remote-dropbox` maps Git's object and ref model onto a flat file
//! store (see [`layout`]), transfers loose objects in parallel with
//! integrity checks (see [`transfer`]), and updates refs atomically using
//! only the store's per-file compare-and-swap primitive (see [`refs`]). The
//! whole thing is driven by the Git remote-helper line protocol on stdio
//! (see [`protocol`]).
//!
//! # Key types
//!
//! - [`BlobStore`] — the contract a cloud storage backend must satisfy.
//! - [`LocalGit`] — the facade over the local repository (loose objects,
//!   refs, ancestry).
//! - [`protocol::Driver`] — runs the remote-helper protocol end to end.

pub mod blobstore;
pub mod error;
pub mod git;
pub mod layout;
pub mod localstore;
pub mod progress;
pub mod protocol;
pub mod refs;
pub mod session;
pub mod token;
pub mod transfer;
pub mod types;
pub mod url;
pub mod workers;

pub use blobstore::{BlobError, BlobStore, FileMetadata, UploadMode};
pub use error::{Error, Result};
pub use git::LocalGit;
pub use localstore::FilesystemBlobStore;
pub use session::Session;
pub use token::{EnvTokenProvider, TokenProvider};
pub use types::{ObjectKind, Revision};
pub use url::RemoteUrl;

/// Number of parallel workers used for object transfer.
///
/// Design value carried over from the reference implementation's `PROCESSES`
/// constant.
pub const PROCESSES: usize = 20;

/// Maximum number of in-place retries for a transient remote error before
/// the operation is promoted to fatal.
pub const MAX_RETRIES: u32 = 3;

/// Payload size above which an object is uploaded via a chunked session
/// instead of a single request.
pub const CHUNK_SIZE: usize = 50 * 1024 * 1024;

/// The well-known SHA-1 of the empty tree. Git may report this object as
/// present even when it has never been written to the local object store.
pub const EMPTY_TREE_SHA: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";
