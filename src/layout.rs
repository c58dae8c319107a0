//! Remote layout (spec §4.3): the deterministic mapping from Git entities to
//! paths inside the remote repository folder.
//!
//! All paths are lower-cased before use, since the blob store treats paths
//! as case-insensitive (spec §3).

use crate::error::{Error, Result};

/// Join path segments with `/`, matching the blob store's flat namespace
/// (it has no concept of a current directory to resolve `.`/`..` against,
/// so unlike a filesystem path joiner this never needs to normalize them).
fn join(root: &str, rest: &str) -> String {
    if root.is_empty() {
        rest.to_string()
    } else {
        format!("{root}/{rest}")
    }
}

/// Lower-case a path for the blob store's case-insensitive namespace.
pub fn canonicalize(path: &str) -> String {
    path.to_lowercase()
}

/// Validate that `name` is a legal ref name for this layout: it must start
/// with `refs/` (spec §3 invariants, §4.3).
pub fn validate_ref_name(name: &str) -> Result<()> {
    if !name.starts_with("refs/") {
        return Err(Error::InvalidRef(format!(
            "ref name `{name}` does not start with `refs/`"
        )));
    }
    Ok(())
}

/// Path to a ref file under the repository root.
pub fn ref_path(root: &str, name: &str) -> Result<String> {
    validate_ref_name(name)?;
    Ok(canonicalize(&join(root, name)))
}

/// Recover the ref name from the full path of a remote ref file (inverse of
/// [`ref_path`], modulo lower-casing).
pub fn ref_name_from_path(root: &str, path: &str) -> Result<String> {
    let prefix = format!("{}/", canonicalize(root));
    let path = canonicalize(path);
    path.strip_prefix(&prefix)
        .map(|s| s.to_string())
        .ok_or_else(|| Error::InvalidRef(format!("path `{path}` is not under `{prefix}`")))
}

/// Path to a loose object file under the repository root: two-character
/// fan-out directory, then the remaining 38 hex characters.
pub fn object_path(root: &str, sha: &str) -> String {
    let (prefix, suffix) = sha.split_at(2.min(sha.len()));
    canonicalize(&join(root, &format!("objects/{prefix}/{suffix}")))
}

/// Path to the `refs/` folder under the repository root, used as the base
/// for a recursive `list_folder` when enumerating refs.
pub fn refs_folder(root: &str) -> String {
    canonicalize(&join(root, "refs"))
}

/// Path to a symbolic-ref file (e.g. `HEAD`), which unlike a direct ref
/// isn't required to live under `refs/`.
pub fn symbolic_ref_path(root: &str, name: &str) -> String {
    canonicalize(&join(root, name))
}
