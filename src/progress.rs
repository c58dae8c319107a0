//! Progress and trace emission (spec §4.6 verbosity gating, §9 design
//! note: "A single progress sink, updated from the main loop only").
//!
//! Two distinct outputs share stderr: in-place `Writing objects:
//! P% (done/total)` / `Receiving objects: ...` lines at `Info`, and
//! discrete per-object trace lines at `Debug`. Neither goes through the
//! `log` crate, since their exact text is part of the wire contract a
//! human watching `git push`/`git fetch` output expects.

use std::cell::Cell;
use std::io::{IsTerminal, Write};

/// Verbosity requested via `option verbosity N` (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Verbosity {
    Error = 0,
    Info = 1,
    Debug = 2,
}

impl Verbosity {
    pub fn from_level(level: u32) -> Self {
        match level {
            0 => Self::Error,
            1 => Self::Info,
            _ => Self::Debug,
        }
    }
}

impl Default for Verbosity {
    fn default() -> Self {
        Self::Info
    }
}

/// Emits progress/trace text to stderr, gated on the session's verbosity.
pub struct Progress {
    verbosity: Verbosity,
    /// Last percentage written via a non-interactive full line, so the
    /// fallback only prints on a new 10% boundary instead of every update.
    last_reported_pct: Cell<Option<usize>>,
}

impl Progress {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            last_reported_pct: Cell::new(None),
        }
    }

    pub fn set_verbosity(&mut self, verbosity: Verbosity) {
        self.verbosity = verbosity;
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// A discrete per-object trace line, printed only at `Debug`.
    pub fn trace(&self, message: &str) {
        if self.verbosity >= Verbosity::Debug {
            eprintln!("debug: {message}");
        }
    }

    /// An informational line, printed at `Info` and above.
    pub fn info(&self, message: &str) {
        if self.verbosity >= Verbosity::Info {
            eprintln!("info: {message}");
        }
    }

    /// Update a percentage line (`label: P% (done/total)`). At `Info` on a
    /// real terminal this rewrites in place with `\r`; on a non-interactive
    /// stderr it instead prints a plain line only when the percentage
    /// crosses a new 10% boundary, so piped/logged output isn't spammed
    /// with one line per object. At `Debug` this does nothing — the caller
    /// should emit per-object trace lines instead (spec §4.6: "no in-place
    /// rewriting is used" at Debug).
    pub fn progress(&self, label: &str, done: usize, total: usize) {
        if self.verbosity != Verbosity::Info || total == 0 {
            return;
        }
        let pct = (done * 100) / total;
        let mut stderr = std::io::stderr();
        if Self::is_interactive() {
            if done == total {
                let _ = write!(stderr, "\r{label}: {pct:3}% ({done}/{total}), done.\n");
            } else {
                let _ = write!(stderr, "\r{label}: {pct:3}% ({done}/{total})");
            }
        } else {
            let bucket = pct / 10;
            let already_reported = self.last_reported_pct.get() == Some(bucket);
            if done != total && already_reported {
                return;
            }
            self.last_reported_pct.set(Some(bucket));
            if done == total {
                let _ = writeln!(stderr, "{label}: {pct:3}% ({done}/{total}), done.");
            } else {
                let _ = writeln!(stderr, "{label}: {pct:3}% ({done}/{total})");
            }
        }
        let _ = stderr.flush();
    }

    /// Whether the in-place rewriting style should be used at all, i.e.
    /// stderr is a real terminal (spec §9: "fall back to periodic full
    /// lines otherwise").
    pub fn is_interactive() -> bool {
        std::io::stderr().is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_ordering() {
        assert!(Verbosity::Debug > Verbosity::Info);
        assert!(Verbosity::Info > Verbosity::Error);
    }

    #[test]
    fn from_level_clamps_above_debug() {
        assert_eq!(Verbosity::from_level(99), Verbosity::Debug);
    }
}
