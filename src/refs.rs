//! Ref manager (spec §4.5, C5): atomic ref create/update/delete via CAS,
//! symbolic-ref (HEAD) handling, and the first-push HEAD bootstrap.

use crate::blobstore::{BlobError, BlobStore, UploadMode};
use crate::error::Result;
use crate::git::LocalGit;
use crate::layout;
use crate::session::Session;
use crate::types::Revision;

/// The exact strings the remote-helper protocol expects as push rejection
/// reasons (spec §4.5 policy table).
pub const FETCH_FIRST: &str = "fetch first";
pub const NON_FAST_FORWARD: &str = "non-fast forward";
pub const REFUSING_DELETE_CURRENT: &str = "refusing to delete the current branch";

/// Update `dst` to `new_sha`, honoring the fast-forward policy table (spec
/// §4.5). Returns `Ok(None)` on success or `Ok(Some(reason))` for a
/// protocol-level rejection; only a store/git failure becomes `Err`.
pub fn write_ref(
    store: &dyn BlobStore,
    git: &LocalGit,
    session: &mut Session,
    root: &str,
    new_sha: &str,
    dst: &str,
    force: bool,
) -> Result<Option<String>> {
    let path = layout::ref_path(root, dst)?;
    let data = format!("{new_sha}\n").into_bytes();

    let mode = match session.listed_ref(dst) {
        None => UploadMode::Add,
        Some((rev, old_sha)) => {
            if force {
                UploadMode::Overwrite
            } else {
                if !git.object_exists(old_sha)? {
                    return Ok(Some(FETCH_FIRST.to_string()));
                }
                if !git.is_ancestor(old_sha, new_sha)? {
                    return Ok(Some(NON_FAST_FORWARD.to_string()));
                }
                UploadMode::Update(rev.clone())
            }
        }
    };

    match store.upload(&path, &data, mode) {
        Ok(_) => Ok(None),
        Err(BlobError::Conflict(_)) => Ok(Some(FETCH_FIRST.to_string())),
        Err(e) => Err(e.into()),
    }
}

/// Delete `name` from the remote, refusing if it is the branch `HEAD`
/// currently points to (spec §4.5).
pub fn delete_ref(
    store: &dyn BlobStore,
    session: &mut Session,
    root: &str,
    name: &str,
) -> Result<Option<String>> {
    if let Some((_, target)) = read_symbolic_ref(store, root, "HEAD")? {
        if target == name {
            return Ok(Some(REFUSING_DELETE_CURRENT.to_string()));
        }
    }
    let path = layout::ref_path(root, name)?;
    match store.delete(&path) {
        Ok(()) | Err(BlobError::NotFound(_)) => {
            session.forget_ref(name);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Read a symbolic ref file (only `HEAD` is used per spec §3), stripping
/// the `ref: ` prefix and trailing whitespace.
pub fn read_symbolic_ref(
    store: &dyn BlobStore,
    root: &str,
    name: &str,
) -> Result<Option<(Revision, String)>> {
    let path = layout::symbolic_ref_path(root, name);
    match store.download(&path) {
        Ok((rev, bytes)) => {
            let text = String::from_utf8_lossy(&bytes);
            let target = text
                .strip_prefix("ref: ")
                .unwrap_or(&text)
                .trim_end()
                .to_string();
            Ok(Some((rev, target)))
        }
        Err(BlobError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write a symbolic ref file. `rev` performs a compare-and-swap against
/// the previously observed revision; `None` performs an atomic add.
/// Returns `false` on conflict rather than erroring, since losing this
/// race is expected under concurrent access.
pub fn write_symbolic_ref(
    store: &dyn BlobStore,
    root: &str,
    name: &str,
    target: &str,
    rev: Option<Revision>,
) -> Result<bool> {
    let path = layout::symbolic_ref_path(root, name);
    let data = format!("ref: {target}\n").into_bytes();
    let mode = match rev {
        Some(rev) => UploadMode::Update(rev),
        None => UploadMode::Add,
    };
    match store.upload(&path, &data, mode) {
        Ok(_) => Ok(true),
        Err(BlobError::Conflict(_)) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// First-push HEAD bootstrap (spec §4.5, §9 open question): when `list`
/// found no refs and this push batch updated at least one, point the
/// remote `HEAD` at it — preferring the ref matching the local `HEAD`
/// target when resolvable, else the first one pushed.
pub fn bootstrap_head(
    store: &dyn BlobStore,
    git: &LocalGit,
    session: &Session,
    root: &str,
    progress: &crate::progress::Progress,
) -> Result<()> {
    let local_head_target = git.symbolic_ref_target("HEAD")?;
    let mut chosen: Option<&str> = None;
    for (name, _) in session.pushed_refs() {
        if Some(name) == local_head_target.as_deref() {
            chosen = Some(name);
            break;
        }
        if chosen.is_none() {
            chosen = Some(name);
        }
    }

    match chosen {
        Some(target) => {
            if !write_symbolic_ref(store, root, "HEAD", target, None)? {
                progress.info("failed to set default branch on remote");
            }
        }
        None => progress.info("first push but no branch to set remote HEAD"),
    }
    Ok(())
}
