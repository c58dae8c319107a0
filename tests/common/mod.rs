//! Shared fixtures for the integration suite: an in-memory `BlobStore` and a
//! throwaway local git2 repository, mirroring how the mock store and temp
//! repo fixtures are built throughout the unit tests in `src/`.

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use git_remote_dropbox::{BlobError, BlobStore, FileMetadata, LocalGit, Revision, UploadMode};

#[derive(Default)]
pub struct MemoryBlobStore {
    files: Mutex<HashMap<String, (Revision, Vec<u8>)>>,
    next_rev: AtomicU64,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_rev(&self) -> Revision {
        let n = self.next_rev.fetch_add(1, Ordering::SeqCst);
        Revision::from(n.to_string())
    }
}

impl BlobStore for MemoryBlobStore {
    fn download(&self, path: &str) -> Result<(Revision, Vec<u8>), BlobError> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(path.to_string()))
    }

    fn upload(&self, path: &str, data: &[u8], mode: UploadMode) -> Result<Revision, BlobError> {
        let mut files = self.files.lock().unwrap();
        match &mode {
            UploadMode::Add => {
                if files.contains_key(path) {
                    return Err(BlobError::Conflict(path.to_string()));
                }
            }
            UploadMode::Update(expected) => match files.get(path) {
                Some((rev, _)) if rev == expected => {}
                _ => return Err(BlobError::Conflict(path.to_string())),
            },
            UploadMode::Overwrite => {}
        }
        let rev = self.alloc_rev();
        files.insert(path.to_string(), (rev.clone(), data.to_vec()));
        Ok(rev)
    }

    fn start_upload_session(&self, chunk: &[u8]) -> Result<git_remote_dropbox::blobstore::UploadCursor, BlobError> {
        Ok(git_remote_dropbox::blobstore::UploadCursor {
            session_id: Some(String::new()),
            offset: chunk.len() as u64,
        })
    }

    fn append_upload_session(
        &self,
        cursor: &mut git_remote_dropbox::blobstore::UploadCursor,
        chunk: &[u8],
    ) -> Result<(), BlobError> {
        cursor.offset += chunk.len() as u64;
        Ok(())
    }

    fn finish_upload_session(
        &self,
        _cursor: git_remote_dropbox::blobstore::UploadCursor,
        path: &str,
        chunk: &[u8],
        mode: UploadMode,
    ) -> Result<Revision, BlobError> {
        self.upload(path, chunk, mode)
    }

    fn list_folder(&self, path: &str, _recursive: bool) -> Result<Vec<FileMetadata>, BlobError> {
        let prefix = format!("{path}/");
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .map(|(k, (rev, _))| FileMetadata {
                path_lower: k.clone(),
                rev: rev.clone(),
            })
            .collect())
    }

    fn delete(&self, path: &str) -> Result<(), BlobError> {
        self.files.lock().unwrap().remove(path);
        Ok(())
    }
}

/// Initialize a throwaway repository at `dir` and return a `LocalGit` handle
/// to it.
pub fn init_repo(dir: &Path) -> LocalGit {
    let status = Command::new("git").args(["init", "-q"]).arg(dir).status().unwrap();
    assert!(status.success());
    LocalGit::open(dir.join(".git")).unwrap()
}

/// Write `name` with `contents`, commit it, and return the new commit sha.
pub fn commit(dir: &Path, name: &str, contents: &str) -> String {
    std::fs::write(dir.join(name), contents).unwrap();
    Command::new("git").current_dir(dir).args(["add", name]).status().unwrap();
    Command::new("git")
        .current_dir(dir)
        .args([
            "-c",
            "user.name=test",
            "-c",
            "user.email=test@example.com",
            "commit",
            "-q",
            "-m",
            "msg",
        ])
        .status()
        .unwrap();
    head_sha(dir)
}

pub fn head_sha(dir: &Path) -> String {
    String::from_utf8(
        Command::new("git")
            .current_dir(dir)
            .args(["rev-parse", "HEAD"])
            .output()
            .unwrap()
            .stdout,
    )
    .unwrap()
    .trim()
    .to_string()
}

/// Create an orphan branch so the next commit shares no history with what
/// came before (used to build a non-fast-forward fixture).
pub fn checkout_orphan(dir: &Path, branch: &str) {
    Command::new("git")
        .current_dir(dir)
        .args(["checkout", "--orphan", branch, "-q"])
        .status()
        .unwrap();
}
