//! Per-invocation session state (spec §3 "Session ref cache", §9 design
//! note: "Ref cache as module state. Replace with an explicit `Session`
//! value owned by the driver and passed to components.").
//!
//! Accessed solely by the single-threaded protocol driver (spec §5:
//! "workers never write the caches").

use std::collections::HashMap;

use crate::types::Revision;

/// State observed at `list` time, plus what this session has pushed so
/// far. Lives only for one helper invocation.
#[derive(Default)]
pub struct Session {
    /// `ref-name -> (revision, sha)` as observed during `list`.
    refs: HashMap<String, (Revision, String)>,
    /// Refs successfully pushed this session, in push order, so "the
    /// first one pushed" (spec §4.5/§9 HEAD bootstrap fallback) is
    /// actually the first one rather than a `HashMap`'s arbitrary order.
    /// A ref pushed more than once keeps its original position but gets
    /// its sha updated in place.
    pushed: Vec<(String, String)>,
    /// Set when `list for-push` found no refs on the remote.
    pub first_push: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_listed_ref(&mut self, name: impl Into<String>, rev: Revision, sha: impl Into<String>) {
        self.refs.insert(name.into(), (rev, sha.into()));
    }

    pub fn listed_ref(&self, name: &str) -> Option<(&Revision, &str)> {
        self.refs.get(name).map(|(rev, sha)| (rev, sha.as_str()))
    }

    pub fn record_pushed(&mut self, name: impl Into<String>, sha: impl Into<String>) {
        let name = name.into();
        let sha = sha.into();
        match self.pushed.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = sha,
            None => self.pushed.push((name, sha)),
        }
    }

    pub fn forget_ref(&mut self, name: &str) {
        self.refs.remove(name);
        self.pushed.retain(|(n, _)| n != name);
    }

    /// Every sha the remote is already known to hold: refs observed at
    /// `list` time, plus refs pushed so far this session (spec §4.4 step
    /// 1: "what the remote already holds").
    pub fn known_remote_shas(&self) -> Vec<String> {
        let mut shas: Vec<String> = self.refs.values().map(|(_, sha)| sha.clone()).collect();
        shas.extend(self.pushed.iter().map(|(_, sha)| sha.clone()));
        shas
    }

    /// Pushed refs in the order they were pushed.
    pub fn pushed_refs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pushed.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_remote_shas_combines_listed_and_pushed() {
        let mut s = Session::new();
        s.record_listed_ref("refs/heads/main", Revision::from("rev1"), "sha1");
        s.record_pushed("refs/heads/feature", "sha2");
        let mut shas = s.known_remote_shas();
        shas.sort();
        assert_eq!(shas, vec!["sha1".to_string(), "sha2".to_string()]);
    }

    #[test]
    fn forget_ref_clears_both_maps() {
        let mut s = Session::new();
        s.record_listed_ref("refs/heads/main", Revision::from("rev1"), "sha1");
        s.record_pushed("refs/heads/main", "sha1");
        s.forget_ref("refs/heads/main");
        assert!(s.listed_ref("refs/heads/main").is_none());
        assert!(s.known_remote_shas().is_empty());
    }
}
