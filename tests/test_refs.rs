//! P4 (fast-forward gate), P5 (CAS race), P10 (HEAD bootstrap), P11
//! (delete-current refusal).

mod common;

use std::sync::Arc;

use common::{checkout_orphan, commit, init_repo, MemoryBlobStore};
use git_remote_dropbox::progress::{Progress, Verbosity};
use git_remote_dropbox::{refs, transfer, BlobStore, Session};

fn quiet() -> Progress {
    Progress::new(Verbosity::Error)
}

fn push_all(store: Arc<dyn BlobStore>, git: &git_remote_dropbox::LocalGit, sha: &str) {
    let objects = git.list_objects(sha, &[]).unwrap();
    transfer::push_objects(store, git, "repo", objects, &quiet()).unwrap();
}

#[test]
fn non_fast_forward_push_is_rejected_and_ref_is_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let git = init_repo(dir.path());
    let old = commit(dir.path(), "a.txt", "one");

    let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
    push_all(store.clone(), &git, &old);
    refs::write_ref(store.as_ref(), &git, &mut Session::new(), "repo", &old, "refs/heads/main", false).unwrap();
    let established_ref_path = git_remote_dropbox::layout::ref_path("repo", "refs/heads/main").unwrap();
    let (established_rev, _) = store.download(&established_ref_path).unwrap();
    let mut session = Session::new();
    session.record_listed_ref("refs/heads/main", established_rev, old.clone());

    checkout_orphan(dir.path(), "other");
    let unrelated = commit(dir.path(), "a.txt", "unrelated");
    push_all(store.clone(), &git, &unrelated);

    let result = refs::write_ref(
        store.as_ref(),
        &git,
        &mut session,
        "repo",
        &unrelated,
        "refs/heads/main",
        false,
    )
    .unwrap();
    assert_eq!(result, Some(refs::NON_FAST_FORWARD.to_string()));

    let ref_path = git_remote_dropbox::layout::ref_path("repo", "refs/heads/main").unwrap();
    let (_, data) = store.download(&ref_path).unwrap();
    assert_eq!(String::from_utf8(data).unwrap(), format!("{old}\n"));
}

#[test]
fn concurrent_pushes_to_the_same_ref_one_wins_one_gets_fetch_first() {
    let dir = tempfile::tempdir().unwrap();
    let git = init_repo(dir.path());
    let old = commit(dir.path(), "a.txt", "base");

    let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
    push_all(store.clone(), &git, &old);

    refs::write_ref(store.as_ref(), &git, &mut Session::new(), "repo", &old, "refs/heads/main", false).unwrap();
    let ref_path = git_remote_dropbox::layout::ref_path("repo", "refs/heads/main").unwrap();
    let (established_rev, _) = store.download(&ref_path).unwrap();

    let mut session_a = Session::new();
    let mut session_b = Session::new();
    session_a.record_listed_ref("refs/heads/main", established_rev.clone(), old.clone());
    session_b.record_listed_ref("refs/heads/main", established_rev, old.clone());

    let new1 = commit(dir.path(), "a.txt", "client-a");
    let parent_of_new1 = git.ref_value("HEAD~1").unwrap();
    assert_eq!(parent_of_new1, old);

    std::process::Command::new("git")
        .current_dir(dir.path())
        .args(["reset", "-q", "--hard", &old])
        .status()
        .unwrap();
    let new2 = commit(dir.path(), "b.txt", "client-b");

    push_all(store.clone(), &git, &new1);
    push_all(store.clone(), &git, &new2);

    let result_a = refs::write_ref(store.as_ref(), &git, &mut session_a, "repo", &new1, "refs/heads/main", false).unwrap();
    let result_b = refs::write_ref(store.as_ref(), &git, &mut session_b, "repo", &new2, "refs/heads/main", false).unwrap();

    let outcomes = [result_a.clone(), result_b.clone()];
    let ok_count = outcomes.iter().filter(|r| r.is_none()).count();
    let conflict_count = outcomes
        .iter()
        .filter(|r| r.as_deref() == Some(refs::FETCH_FIRST))
        .count();
    assert_eq!(ok_count, 1);
    assert_eq!(conflict_count, 1);

    let winner = if result_a.is_none() { &new1 } else { &new2 };
    let ref_path = git_remote_dropbox::layout::ref_path("repo", "refs/heads/main").unwrap();
    let (_, data) = store.download(&ref_path).unwrap();
    assert_eq!(String::from_utf8(data).unwrap(), format!("{winner}\n"));
}

#[test]
fn first_push_sets_head_to_the_pushed_branch() {
    let dir = tempfile::tempdir().unwrap();
    let git = init_repo(dir.path());
    let sha = commit(dir.path(), "a.txt", "hello");

    let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
    push_all(store.clone(), &git, &sha);
    let mut session = Session::new();
    session.first_push = true;
    refs::write_ref(store.as_ref(), &git, &mut session, "repo", &sha, "refs/heads/main", false).unwrap();
    session.record_pushed("refs/heads/main", sha);

    refs::bootstrap_head(store.as_ref(), &git, &session, "repo", &quiet()).unwrap();

    let head = refs::read_symbolic_ref(store.as_ref(), "repo", "HEAD").unwrap();
    assert_eq!(head.unwrap().1, "refs/heads/main");
}

#[test]
fn deleting_the_current_branch_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let git = init_repo(dir.path());
    let sha = commit(dir.path(), "a.txt", "hello");

    let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
    push_all(store.clone(), &git, &sha);
    let mut session = Session::new();
    refs::write_ref(store.as_ref(), &git, &mut session, "repo", &sha, "refs/heads/main", false).unwrap();
    refs::write_symbolic_ref(store.as_ref(), "repo", "HEAD", "refs/heads/main", None).unwrap();

    let result = refs::delete_ref(store.as_ref(), &mut session, "repo", "refs/heads/main").unwrap();
    assert_eq!(result, Some(refs::REFUSING_DELETE_CURRENT.to_string()));

    let ref_path = git_remote_dropbox::layout::ref_path("repo", "refs/heads/main").unwrap();
    assert!(store.download(&ref_path).is_ok());
}
