//! Transfer engine (spec §4.4, C4): parallel, resumable, integrity-checked
//! movement of loose objects between the local repository and the remote
//! blob store.
//!
//! Both directions drive a [`crate::workers::WorkerPool`] of size
//! [`crate::PROCESSES`], each worker holding its own cloned `Arc<dyn
//! BlobStore>` handle (spec §4.7(c)) rather than sharing one connection.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::blobstore::{BlobError, BlobStore, UploadCursor, UploadMode};
use crate::error::{Error, Result};
use crate::git::LocalGit;
use crate::layout;
use crate::progress::Progress;
use crate::workers::WorkerPool;
use crate::{CHUNK_SIZE, MAX_RETRIES, PROCESSES};

/// Retry a blob-store operation up to [`MAX_RETRIES`] times on a transient
/// failure (spec §7 category 3); any other error is fatal immediately.
fn with_retries<T>(mut op: impl FnMut() -> std::result::Result<T, BlobError>) -> Result<T> {
    let mut attempt = 0;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(BlobError::Transient(msg)) if attempt < MAX_RETRIES => {
                attempt += 1;
                log::debug!("transient error, retry {attempt}/{MAX_RETRIES}: {msg}");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Push
// ---------------------------------------------------------------------------

/// Upload every object in `objects` to the remote, in parallel. Objects are
/// content-addressed, so a write that lands on an already-present sha is
/// harmless; uploads use [`UploadMode::Overwrite`] rather than `Add` so a
/// resumed push never fails on an object a previous attempt already
/// delivered (spec §4.4 push path, §8 P8 "resumable/idempotent transfer").
pub fn push_objects(
    store: Arc<dyn BlobStore>,
    git: &LocalGit,
    root: &str,
    objects: Vec<String>,
    progress: &Progress,
) -> Result<()> {
    let total = objects.len();
    if total == 0 {
        return Ok(());
    }

    let root = root.to_string();
    let git_for_pool = git.clone();
    let pool: WorkerPool<String, Result<(String, String)>> = WorkerPool::new(
        PROCESSES,
        move || store.clone(),
        move |conn, sha: String| upload_one(conn, &git_for_pool, &root, &sha),
    );

    for sha in &objects {
        pool.submit(sha.clone());
    }

    // Trace emission stays on this thread (the sink is main-loop-only, per
    // progress.rs), even though the upload itself happened on a worker.
    let mut done = 0;
    for _ in 0..total {
        match pool.recv() {
            Ok((_, path)) => {
                progress.trace(&format!("writing: {path}"));
                done += 1;
                progress.progress("Writing objects", done, total);
            }
            Err(e) => {
                pool.shutdown();
                return Err(e);
            }
        }
    }
    pool.shutdown();
    Ok(())
}

fn upload_one(store: &Arc<dyn BlobStore>, git: &LocalGit, root: &str, sha: &str) -> Result<(String, String)> {
    let data = git.encode_object(sha)?;
    let path = layout::object_path(root, sha);
    if data.len() > CHUNK_SIZE {
        upload_chunked(store.as_ref(), &path, &data)?;
    } else {
        with_retries(|| store.upload(&path, &data, UploadMode::Overwrite).map(|_| ()))?;
    }
    Ok((sha.to_string(), path))
}

/// Upload `data` in [`CHUNK_SIZE`] pieces via the store's session API,
/// resuming from the offset the store reports on a mismatch rather than
/// restarting the whole object (spec §4.4 push path, §8 P8).
fn upload_chunked(store: &dyn BlobStore, path: &str, data: &[u8]) -> Result<()> {
    let mut offset: usize = 0;
    let mut cursor: Option<UploadCursor> = None;
    let mut retries = 0u32;

    loop {
        let end = (offset + CHUNK_SIZE).min(data.len());
        let chunk = &data[offset..end];
        let is_last = end == data.len();

        let outcome: std::result::Result<(), BlobError> = if cursor.is_none() {
            store.start_upload_session(chunk).map(|c| cursor = Some(c))
        } else if !is_last {
            let c = cursor.as_mut().expect("cursor set above");
            store.append_upload_session(c, chunk)
        } else {
            let c = cursor.clone().expect("cursor set above");
            store
                .finish_upload_session(c, path, chunk, UploadMode::Overwrite)
                .map(|_| ())
        };

        match outcome {
            Ok(()) => {
                offset = end;
                if is_last {
                    return Ok(());
                }
            }
            Err(BlobError::OffsetMismatch { correct_offset }) => {
                retries += 1;
                if retries > MAX_RETRIES {
                    return Err(Error::WorkerFailure(format!(
                        "upload session offset kept mismatching at {path}"
                    )));
                }
                offset = correct_offset as usize;
            }
            Err(BlobError::Transient(msg)) => {
                retries += 1;
                if retries > MAX_RETRIES {
                    return Err(BlobError::Transient(msg).into());
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Fetch
// ---------------------------------------------------------------------------

/// Route `child` onto whichever queue applies: explore it locally if its
/// object is already present but its own closure isn't confirmed complete,
/// otherwise queue it for download. A resumed fetch must apply this check
/// uniformly to every candidate sha, not just the top-level `want`, since an
/// earlier interrupted fetch can leave an intermediate object written with
/// deeper descendants still missing.
fn enqueue_child(
    git: &LocalGit,
    child: String,
    seen: &mut HashSet<String>,
    download_queue: &mut VecDeque<String>,
    explore_queue: &mut VecDeque<String>,
    total: &mut usize,
    progress: &Progress,
) -> Result<()> {
    if LocalGit::is_empty_tree(&child) {
        git.ensure_empty_tree_written()?;
        return Ok(());
    }
    if git.history_exists(&child)? {
        progress.trace(&format!("{child} already downloaded"));
        return Ok(());
    }
    if !seen.insert(child.clone()) {
        return Ok(());
    }
    if git.object_exists(&child)? {
        explore_queue.push_back(child);
    } else {
        progress.trace(&format!("missing part of history from {child}"));
        *total += 1;
        download_queue.push_back(child);
    }
    Ok(())
}

/// Download the transitive closure of `want` that is not already present
/// locally, verifying each object's hash as it lands (spec §4.4 fetch path,
/// §8 P7 integrity, P8 resumability, P9 empty-tree special case).
pub fn fetch_object(
    store: Arc<dyn BlobStore>,
    git: &LocalGit,
    root: &str,
    want: &str,
    progress: &Progress,
) -> Result<()> {
    if LocalGit::is_empty_tree(want) {
        git.ensure_empty_tree_written()?;
        return Ok(());
    }
    if git.history_exists(want)? {
        return Ok(());
    }

    let root = root.to_string();
    let git_for_pool = git.clone();
    let pool: WorkerPool<String, Result<(String, String, Vec<u8>)>> = WorkerPool::new(
        PROCESSES,
        move || store.clone(),
        move |conn, sha: String| download_one(conn, &root, &sha),
    );

    let mut seen: HashSet<String> = HashSet::new();
    // Missing locally, fed through the download pool.
    let mut download_queue: VecDeque<String> = VecDeque::new();
    // Present locally but not yet confirmed complete; walked directly.
    let mut explore_queue: VecDeque<String> = VecDeque::new();

    seen.insert(want.to_string());
    download_queue.push_back(want.to_string());

    let mut in_flight = 0usize;
    let mut done = 0usize;
    let mut total = 1usize;

    loop {
        while let Some(sha) = explore_queue.pop_front() {
            for child in git.referenced_objects(&sha)? {
                enqueue_child(
                    git,
                    child,
                    &mut seen,
                    &mut download_queue,
                    &mut explore_queue,
                    &mut total,
                    progress,
                )?;
            }
        }

        while in_flight < PROCESSES && !download_queue.is_empty() {
            pool.submit(download_queue.pop_front().expect("queue checked non-empty"));
            in_flight += 1;
        }
        if in_flight == 0 {
            break;
        }

        let result = pool.recv();
        in_flight -= 1;

        let (sha, path, data) = match result {
            Ok(triple) => triple,
            Err(e) => {
                pool.shutdown();
                return Err(e);
            }
        };
        progress.trace(&format!("fetching: {path}"));

        let computed = git.decode_and_store(&data)?;
        if computed != sha {
            pool.shutdown();
            return Err(Error::Integrity {
                expected: sha,
                actual: computed,
            });
        }

        done += 1;
        progress.progress("Receiving objects", done, total);

        for child in git.referenced_objects(&sha)? {
            enqueue_child(
                git,
                child,
                &mut seen,
                &mut download_queue,
                &mut explore_queue,
                &mut total,
                progress,
            )?;
        }
    }

    pool.shutdown();
    Ok(())
}

fn download_one(store: &Arc<dyn BlobStore>, root: &str, sha: &str) -> Result<(String, String, Vec<u8>)> {
    let path = layout::object_path(root, sha);
    let (_, data) = with_retries(|| store.download(&path))?;
    Ok((sha.to_string(), path, data))
}
