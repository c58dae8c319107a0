//! Protocol driver (spec §4.6, C6): the Git remote-helper line protocol on
//! stdin/stdout, dispatching to the ref manager and transfer engine.

use std::io::{BufRead, Write};
use std::sync::Arc;

use crate::blobstore::BlobStore;
use crate::error::{Error, Result};
use crate::git::LocalGit;
use crate::layout;
use crate::progress::{Progress, Verbosity};
use crate::refs;
use crate::session::Session;
use crate::transfer;
use crate::types::Revision;
use crate::workers::WorkerPool;
use crate::PROCESSES;

/// Runs the remote-helper protocol to completion against `stdin`/`stdout`.
pub struct Driver<R, W> {
    store: Arc<dyn BlobStore>,
    git: LocalGit,
    root: String,
    session: Session,
    progress: Progress,
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Driver<R, W> {
    pub fn new(store: Arc<dyn BlobStore>, git: LocalGit, root: String, input: R, output: W) -> Self {
        Self {
            store,
            git,
            root,
            session: Session::new(),
            progress: Progress::new(Verbosity::default()),
            input,
            output,
        }
    }

    /// Verbosity last requested via `option verbosity N`, so the caller can
    /// decide how much detail to show for a fatal error after `run` returns.
    pub fn verbosity(&self) -> Verbosity {
        self.progress.verbosity()
    }

    /// Read and dispatch commands until a top-level blank line or EOF.
    pub fn run(&mut self) -> Result<()> {
        loop {
            let line = self.read_line()?;
            let line = match line {
                Some(l) => l,
                None => return Ok(()),
            };
            let trimmed = line.trim_end_matches('\n');
            if trimmed.is_empty() {
                return Ok(());
            }

            let mut parts = trimmed.splitn(2, ' ');
            let cmd = parts.next().unwrap_or("");
            let rest = parts.next().unwrap_or("");

            match cmd {
                "capabilities" => self.capabilities()?,
                "option" => self.option(rest)?,
                "list" => self.list(rest == "for-push")?,
                "push" => self.push_batch(trimmed)?,
                "fetch" => self.fetch_batch(trimmed)?,
                _ => return Err(Error::InvalidCommand(trimmed.to_string())),
            }
        }
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut buf = String::new();
        let n = self.input.read_line(&mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(buf))
    }

    fn capabilities(&mut self) -> Result<()> {
        writeln!(self.output, "option")?;
        writeln!(self.output, "push")?;
        writeln!(self.output, "fetch")?;
        writeln!(self.output)?;
        self.output.flush()?;
        Ok(())
    }

    fn option(&mut self, rest: &str) -> Result<()> {
        let mut parts = rest.splitn(2, ' ');
        let name = parts.next().unwrap_or("");
        let value = parts.next().unwrap_or("");
        if name == "verbosity" {
            let level: u32 = value.trim().parse().unwrap_or(1);
            self.progress.set_verbosity(Verbosity::from_level(level));
            writeln!(self.output, "ok")?;
        } else {
            writeln!(self.output, "unsupported")?;
        }
        self.output.flush()?;
        Ok(())
    }

    fn list(&mut self, for_push: bool) -> Result<()> {
        let folder = layout::refs_folder(&self.root);
        let entries = self.store.list_folder(&folder, true)?;

        let mut listed: Vec<(String, Revision, String)> = if entries.is_empty() {
            Vec::new()
        } else {
            let workers = PROCESSES.min(entries.len());
            let store = self.store.clone();
            let root = self.root.clone();
            let pool: WorkerPool<String, Result<(String, Revision, String)>> = WorkerPool::new(
                workers,
                move || store.clone(),
                move |conn, path: String| {
                    let (rev, bytes) = conn.download(&path)?;
                    let sha = String::from_utf8_lossy(&bytes).trim().to_string();
                    let name = layout::ref_name_from_path(&root, &path)?;
                    Ok((name, rev, sha))
                },
            );
            for entry in &entries {
                pool.submit(entry.path_lower.clone());
            }
            let mut out = Vec::with_capacity(entries.len());
            for _ in &entries {
                out.push(pool.recv()?);
            }
            pool.shutdown();
            out
        };
        listed.sort_by(|a, b| a.0.cmp(&b.0));

        for (name, rev, sha) in &listed {
            self.session.record_listed_ref(name.clone(), rev.clone(), sha.clone());
            writeln!(self.output, "{sha} {name}")?;
        }

        if for_push && listed.is_empty() {
            self.session.first_push = true;
        }

        let head = if for_push {
            None
        } else {
            refs::read_symbolic_ref(self.store.as_ref(), &self.root, "HEAD")?
        };
        if let Some((_, target)) = &head {
            writeln!(self.output, "@{target} HEAD")?;
        }

        if listed.is_empty() {
            self.progress.info("repository is empty");
        }
        if !for_push && head.is_none() {
            self.progress.info("no default branch on remote");
        }

        writeln!(self.output)?;
        self.output.flush()?;
        Ok(())
    }

    fn push_batch(&mut self, first_line: &str) -> Result<()> {
        let mut specs = vec![first_line.trim_start_matches("push ").to_string()];
        loop {
            let line = self.read_line()?.ok_or_else(|| {
                Error::Protocol("stdin closed mid-push-batch".to_string())
            })?;
            let trimmed = line.trim_end_matches('\n');
            if trimmed.is_empty() {
                break;
            }
            specs.push(trimmed.trim_start_matches("push ").to_string());
        }

        for spec in specs {
            let (force, src, dst) = parse_push_spec(&spec);
            match self.push_one(force, src, dst.clone()) {
                Ok(None) => writeln!(self.output, "ok {dst}")?,
                Ok(Some(reason)) => writeln!(self.output, "error {dst} {reason}")?,
                Err(e) => return Err(e),
            }
        }

        if self.session.first_push {
            refs::bootstrap_head(self.store.as_ref(), &self.git, &self.session, &self.root, &self.progress)?;
        }

        writeln!(self.output)?;
        self.output.flush()?;
        Ok(())
    }

    fn push_one(&mut self, force: bool, src: Option<String>, dst: String) -> Result<Option<String>> {
        match src {
            None => refs::delete_ref(self.store.as_ref(), &mut self.session, &self.root, &dst),
            Some(src) => {
                let new_sha = self.git.ref_value(&src)?;
                let excludes = self.session.known_remote_shas();
                let objects = self.git.list_objects(&new_sha, &excludes)?;
                transfer::push_objects(self.store.clone(), &self.git, &self.root, objects, &self.progress)?;
                let result = refs::write_ref(
                    self.store.as_ref(),
                    &self.git,
                    &mut self.session,
                    &self.root,
                    &new_sha,
                    &dst,
                    force,
                )?;
                if result.is_none() {
                    self.session.record_pushed(dst, new_sha);
                }
                Ok(result)
            }
        }
    }

    fn fetch_batch(&mut self, first_line: &str) -> Result<()> {
        let mut entries = vec![first_line.to_string()];
        loop {
            let line = self.read_line()?.ok_or_else(|| {
                Error::Protocol("stdin closed mid-fetch-batch".to_string())
            })?;
            let trimmed = line.trim_end_matches('\n');
            if trimmed.is_empty() {
                break;
            }
            entries.push(trimmed.to_string());
        }

        for entry in entries {
            let mut parts = entry.splitn(3, ' ');
            let _cmd = parts.next();
            let sha = parts
                .next()
                .ok_or_else(|| Error::Protocol(format!("malformed fetch line `{entry}`")))?;
            transfer::fetch_object(self.store.clone(), &self.git, &self.root, sha, &self.progress)?;
        }

        writeln!(self.output)?;
        self.output.flush()?;
        Ok(())
    }
}

fn parse_push_spec(spec: &str) -> (bool, Option<String>, String) {
    let (force, rest) = match spec.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, spec),
    };
    let (src, dst) = rest.split_once(':').unwrap_or(("", rest));
    let src = if src.is_empty() { None } else { Some(src.to_string()) };
    (force, src, dst.to_string())
}
