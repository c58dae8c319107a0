//! A filesystem-backed [`BlobStore`] (spec §1: "the concrete blob-store SDK
//! ... is peripheral"; §6: "any implementation meeting this contract plugs
//! in").
//!
//! This is the backend the binary actually ships with, since depending on a
//! real cloud provider's SDK is out of scope for this crate. It stores each
//! remote path as a file under a root directory and derives revision tokens
//! from each file's modification time, which is good enough to exercise the
//! CAS contract locally (e.g. two `git-remote-dropbox` clones pointed at the
//! same directory) but is not a substitute for a real multi-client store.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::blobstore::{BlobError, BlobStore, FileMetadata, UploadCursor, UploadMode};
use crate::types::Revision;

pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn revision_of(&self, full: &Path) -> std::io::Result<Revision> {
        let meta = fs::metadata(full)?;
        let modified = meta.modified()?.duration_since(UNIX_EPOCH).unwrap_or_default();
        Ok(Revision::from(format!("{}-{}", modified.as_nanos(), meta.len())))
    }

    fn temp_path(&self) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        self.root.join(format!(".upload-{nanos}-{:?}", std::thread::current().id()))
    }
}

impl BlobStore for FilesystemBlobStore {
    fn download(&self, path: &str) -> Result<(Revision, Vec<u8>), BlobError> {
        let full = self.full_path(path);
        let data = fs::read(&full).map_err(|_| BlobError::NotFound(path.to_string()))?;
        let rev = self
            .revision_of(&full)
            .map_err(|e| BlobError::Transient(e.to_string()))?;
        Ok((rev, data))
    }

    fn upload(&self, path: &str, data: &[u8], mode: UploadMode) -> Result<Revision, BlobError> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| BlobError::Transient(e.to_string()))?;
        }

        match mode {
            UploadMode::Add => {
                let mut f = fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&full)
                    .map_err(|_| BlobError::Conflict(path.to_string()))?;
                f.write_all(data).map_err(|e| BlobError::Transient(e.to_string()))?;
            }
            UploadMode::Overwrite => {
                fs::write(&full, data).map_err(|e| BlobError::Transient(e.to_string()))?;
            }
            UploadMode::Update(expected) => {
                let current = self
                    .revision_of(&full)
                    .map_err(|_| BlobError::Conflict(path.to_string()))?;
                if current != expected {
                    return Err(BlobError::Conflict(path.to_string()));
                }
                let tmp = self.temp_path();
                fs::write(&tmp, data).map_err(|e| BlobError::Transient(e.to_string()))?;
                fs::rename(&tmp, &full).map_err(|e| BlobError::Transient(e.to_string()))?;
            }
        }

        self.revision_of(&full).map_err(|e| BlobError::Transient(e.to_string()))
    }

    fn start_upload_session(&self, chunk: &[u8]) -> Result<UploadCursor, BlobError> {
        let tmp = self.temp_path();
        fs::write(&tmp, chunk).map_err(|e| BlobError::Transient(e.to_string()))?;
        Ok(UploadCursor {
            session_id: Some(tmp.to_string_lossy().into_owned()),
            offset: chunk.len() as u64,
        })
    }

    fn append_upload_session(&self, cursor: &mut UploadCursor, chunk: &[u8]) -> Result<(), BlobError> {
        let session_path = cursor
            .session_id
            .as_ref()
            .ok_or_else(|| BlobError::Transient("append with no active session".to_string()))?;
        let mut f = fs::OpenOptions::new()
            .append(true)
            .open(session_path)
            .map_err(|e| BlobError::Transient(e.to_string()))?;
        f.write_all(chunk).map_err(|e| BlobError::Transient(e.to_string()))?;
        cursor.offset += chunk.len() as u64;
        Ok(())
    }

    fn finish_upload_session(
        &self,
        cursor: UploadCursor,
        path: &str,
        chunk: &[u8],
        mode: UploadMode,
    ) -> Result<Revision, BlobError> {
        let session_path = cursor
            .session_id
            .ok_or_else(|| BlobError::Transient("finish with no active session".to_string()))?;
        let mut f = fs::OpenOptions::new()
            .append(true)
            .open(&session_path)
            .map_err(|e| BlobError::Transient(e.to_string()))?;
        f.write_all(chunk).map_err(|e| BlobError::Transient(e.to_string()))?;
        drop(f);

        let data = fs::read(&session_path).map_err(|e| BlobError::Transient(e.to_string()))?;
        let _ = fs::remove_file(&session_path);
        self.upload(path, &data, mode)
    }

    fn list_folder(&self, path: &str, recursive: bool) -> Result<Vec<FileMetadata>, BlobError> {
        let full = self.full_path(path);
        let mut out = Vec::new();
        if !full.exists() {
            return Ok(out);
        }
        self.walk(&full, recursive, &mut out)
            .map_err(|e| BlobError::Transient(e.to_string()))?;
        Ok(out)
    }

    fn delete(&self, path: &str) -> Result<(), BlobError> {
        let full = self.full_path(path);
        match fs::remove_file(&full) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BlobError::Transient(e.to_string())),
        }
    }
}

impl FilesystemBlobStore {
    fn walk(&self, dir: &Path, recursive: bool, out: &mut Vec<FileMetadata>) -> std::io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                if recursive {
                    self.walk(&entry.path(), recursive, out)?;
                }
            } else if file_type.is_file() {
                let rel = entry
                    .path()
                    .strip_prefix(&self.root)
                    .unwrap_or(&entry.path())
                    .to_string_lossy()
                    .replace('\\', "/");
                let rev = self.revision_of(&entry.path())?;
                out.push(FileMetadata {
                    path_lower: rel.to_lowercase(),
                    rev,
                });
            }
        }
        Ok(())
    }
}
