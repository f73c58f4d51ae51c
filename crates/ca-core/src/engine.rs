//! Link back to the host engine.
//!
//! The host receives single-string notices on three channels (error,
//! informational, file output) plus a progress fraction it forwards to its
//! own UI.

use std::fmt;
use tracing::{error, info, trace};

/// One diagnostic message for the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Error(String),
    Info(String),
    /// A file the tool has written, rendered by the host as a link.
    FileOutput(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Notice::Error(m) | Notice::Info(m) | Notice::FileOutput(m) => m,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Error(m) => write!(f, "error: {m}"),
            Notice::Info(m) => write!(f, "info: {m}"),
            Notice::FileOutput(m) => write!(f, "file: {m}"),
        }
    }
}

/// Host-side sink for notices and progress.
pub trait EngineLink {
    fn notify(&mut self, notice: Notice);

    /// Progress fraction in `[0.0, 1.0]`.
    fn progress(&mut self, fraction: f64);
}

impl<L: EngineLink + ?Sized> EngineLink for &mut L {
    fn notify(&mut self, notice: Notice) {
        (**self).notify(notice);
    }

    fn progress(&mut self, fraction: f64) {
        (**self).progress(fraction);
    }
}

/// Routes notices through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLink;

impl EngineLink for TracingLink {
    fn notify(&mut self, notice: Notice) {
        match notice {
            Notice::Error(message) => error!(target: "csv_append::engine", "{message}"),
            Notice::Info(message) => info!(target: "csv_append::engine", "{message}"),
            Notice::FileOutput(message) => {
                info!(target: "csv_append::engine", file_output = true, "{message}")
            }
        }
    }

    fn progress(&mut self, fraction: f64) {
        trace!(target: "csv_append::engine", fraction, "progress");
    }
}

/// Keeps every notice and progress value in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLink {
    pub notices: Vec<Notice>,
    pub progress: Vec<f64>,
}

impl MemoryLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<&str> {
        self.filter(|n| matches!(n, Notice::Error(_)))
    }

    pub fn infos(&self) -> Vec<&str> {
        self.filter(|n| matches!(n, Notice::Info(_)))
    }

    pub fn file_outputs(&self) -> Vec<&str> {
        self.filter(|n| matches!(n, Notice::FileOutput(_)))
    }

    fn filter(&self, keep: impl Fn(&Notice) -> bool) -> Vec<&str> {
        self.notices
            .iter()
            .filter(|n| keep(n))
            .map(Notice::message)
            .collect()
    }
}

impl EngineLink for MemoryLink {
    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    fn progress(&mut self, fraction: f64) {
        self.progress.push(fraction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_link_sorts_channels() {
        let mut link = MemoryLink::new();
        link.notify(Notice::Error("bad".into()));
        link.notify(Notice::Info("hello".into()));
        link.notify(Notice::FileOutput("out.csv".into()));
        link.progress(0.5);

        assert_eq!(link.errors(), vec!["bad"]);
        assert_eq!(link.infos(), vec!["hello"]);
        assert_eq!(link.file_outputs(), vec!["out.csv"]);
        assert_eq!(link.progress, vec![0.5]);
    }

    fn announce<L: EngineLink>(mut link: L) {
        link.notify(Notice::Info("x".into()));
        link.progress(1.0);
    }

    #[test]
    fn borrowed_link_forwards() {
        let mut link = MemoryLink::new();
        announce(&mut link);
        assert_eq!(link.infos(), vec!["x"]);
        assert_eq!(link.progress, vec![1.0]);
    }

    #[test]
    fn notice_display() {
        assert_eq!(Notice::Error("e".into()).to_string(), "error: e");
        assert_eq!(Notice::FileOutput("f".into()).message(), "f");
    }
}
