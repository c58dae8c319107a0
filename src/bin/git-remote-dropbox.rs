//! Binary entry point. Git invokes this as `git-remote-dropbox <remote-name>
//! <url>` whenever a URL uses the `dropbox://` transport (spec §1, §6).
//!
//! Deliberately thin: parse arguments, resolve a token, open the local
//! repository, construct a concrete `BlobStore`, and hand off to the
//! protocol driver. All interesting behavior lives in the library.

use std::path::PathBuf;
use std::sync::Arc;

use git_remote_dropbox::progress::Verbosity;
use git_remote_dropbox::{token, BlobStore, Error, FilesystemBlobStore, LocalGit, RemoteUrl, Result};

fn main() {
    env_logger::init();
    if let Err((e, verbosity)) = run() {
        report_fatal(&e, verbosity);
        std::process::exit(1);
    }
}

fn run() -> std::result::Result<(), (Error, Verbosity)> {
    let setup_error = |e: Error| (e, Verbosity::default());

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        return Err(setup_error(Error::Protocol(format!(
            "usage: {} <remote-name> <url>",
            args.first().map(String::as_str).unwrap_or("git-remote-dropbox")
        ))));
    }
    let url: RemoteUrl = args[2].parse().map_err(Error::from).map_err(setup_error)?;

    // Resolved eagerly so a missing credential fails fast, the way a real
    // SDK-backed store would reject the first request.
    let fallback = token::EnvTokenProvider::default();
    let _token = token::resolve(url.inline_token.as_deref(), &fallback).map_err(setup_error)?;

    let git_dir = std::env::var("GIT_DIR").unwrap_or_else(|_| ".git".to_string());
    let git = LocalGit::open(git_dir).map_err(setup_error)?;

    let store = Arc::new(open_local_store(&url.path).map_err(setup_error)?) as Arc<dyn BlobStore>;

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut driver = git_remote_dropbox::protocol::Driver::new(store, git, url.path, stdin.lock(), stdout.lock());
    driver.run().map_err(|e| {
        let verbosity = driver.verbosity();
        (e, verbosity)
    })
}

/// Terse one-line message normally; at `option verbosity 2` (debug), print
/// the full cause chain instead, mirroring the original's behavior of
/// re-raising the underlying exception when debugging is enabled.
fn report_fatal(e: &Error, verbosity: Verbosity) {
    eprintln!("error: {e}");
    if verbosity == Verbosity::Debug {
        let mut cause = std::error::Error::source(e);
        while let Some(c) = cause {
            eprintln!("caused by: {c}");
            cause = c.source();
        }
    }
}

/// Root directory for the filesystem-backed reference `BlobStore` (spec §1:
/// the real SDK is an external collaborator this crate does not ship).
/// Override with `GIT_REMOTE_DROPBOX_LOCAL_ROOT` to point multiple clones at
/// a shared directory and exercise the CAS contract for real.
fn open_local_store(repo_path: &str) -> Result<FilesystemBlobStore> {
    let base = std::env::var("GIT_REMOTE_DROPBOX_LOCAL_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir().join("git-remote-dropbox"));
    let root = base.join(repo_path);
    std::fs::create_dir_all(&root)?;
    Ok(FilesystemBlobStore::new(root))
}
