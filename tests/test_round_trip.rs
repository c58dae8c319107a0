//! P1 (round-trip), P6 (objects-before-ref), P8 (resume).

mod common;

use std::sync::Arc;

use common::{commit, init_repo, MemoryBlobStore};
use git_remote_dropbox::progress::{Progress, Verbosity};
use git_remote_dropbox::{refs, transfer, BlobStore, Session};

fn quiet() -> Progress {
    Progress::new(Verbosity::Error)
}

#[test]
fn push_then_fetch_round_trip_is_byte_identical() {
    let src_dir = tempfile::tempdir().unwrap();
    let src_git = init_repo(src_dir.path());
    commit(src_dir.path(), "a.txt", "one");
    let sha = commit(src_dir.path(), "a.txt", "two");

    let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
    let progress = quiet();
    let objects = src_git.list_objects(&sha, &[]).unwrap();
    transfer::push_objects(store.clone(), &src_git, "repo", objects.clone(), &progress).unwrap();
    let mut session = Session::new();
    refs::write_ref(store.as_ref(), &src_git, &mut session, "repo", &sha, "refs/heads/x", false).unwrap();

    let dst_dir = tempfile::tempdir().unwrap();
    let dst_git = init_repo(dst_dir.path());
    transfer::fetch_object(store, &dst_git, "repo", &sha, &progress).unwrap();

    assert!(dst_git.history_exists(&sha).unwrap());
    for obj in &objects {
        assert_eq!(
            src_git.object_payload(obj).unwrap(),
            dst_git.object_payload(obj).unwrap()
        );
    }
}

#[test]
fn objects_are_present_before_ref_is_updated() {
    let src_dir = tempfile::tempdir().unwrap();
    let src_git = init_repo(src_dir.path());
    let sha = commit(src_dir.path(), "a.txt", "hello");

    let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
    let progress = quiet();
    let objects = src_git.list_objects(&sha, &[]).unwrap();
    transfer::push_objects(store.clone(), &src_git, "repo", objects.clone(), &progress).unwrap();

    // Before the ref write, every object is already downloadable.
    for obj in &objects {
        let path = git_remote_dropbox::layout::object_path("repo", obj);
        assert!(store.download(&path).is_ok());
    }
    // And the ref itself doesn't exist yet.
    let ref_path = git_remote_dropbox::layout::ref_path("repo", "refs/heads/x").unwrap();
    assert!(store.download(&ref_path).is_err());
}

#[test]
fn interrupted_fetch_resumes_without_redownloading_everything() {
    let src_dir = tempfile::tempdir().unwrap();
    let src_git = init_repo(src_dir.path());
    let sha = commit(src_dir.path(), "a.txt", "hello");

    let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
    let progress = quiet();
    let objects = src_git.list_objects(&sha, &[]).unwrap();
    transfer::push_objects(store.clone(), &src_git, "repo", objects, &progress).unwrap();

    let dst_dir = tempfile::tempdir().unwrap();
    let dst_git = init_repo(dst_dir.path());

    // Simulate a fetch that was interrupted after the blob alone landed
    // locally: the tree and commit are still missing.
    let tree_sha = &src_git.referenced_objects(&sha).unwrap()[0];
    let blob_sha = &src_git.referenced_objects(tree_sha).unwrap()[0];
    let payload = src_git.object_payload(blob_sha).unwrap();
    dst_git
        .write_object(git_remote_dropbox::ObjectKind::Blob, &payload)
        .unwrap();
    assert!(dst_git.object_exists(blob_sha).unwrap());
    assert!(!dst_git.history_exists(&sha).unwrap());

    transfer::fetch_object(store, &dst_git, "repo", &sha, &progress).unwrap();
    assert!(dst_git.history_exists(&sha).unwrap());
}
