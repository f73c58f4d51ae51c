//! Plugin lifecycle.
//!
//! The host drives the plugin through a fixed sequence of calls. The state
//! machine makes that sequence explicit:
//!
//! ```text
//! Created ──initialize──▶ Validated ──bind_schema──▶ Streaming ──close──▶ Closed
//!    │                        │                                             ▲
//!    └────────────────────────┴──────────────────close───────────────────────┘
//! ```
//!
//! A failed validation does not stop the sequence. It disables the plugin:
//! every later `push_record` returns `false` without buffering, and `close`
//! writes nothing.

use std::fmt;
use std::path::PathBuf;

use ca_common::FieldSchema;
use ca_config::{validate, validate_in, FormatConfig, RawSettings, ValidationErrors};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::buffer::ColumnBuffers;
use crate::engine::{EngineLink, Notice};
use crate::record::Record;
use crate::writer::CsvAppender;

/// Records buffered before an automatic flush.
pub const CHUNK_SIZE: usize = 1_000_000;

/// Chunks of rows held back by failed flushes before the host is warned.
pub const RETAINED_CHUNKS_WARN: usize = 4;

// ── States ──────────────────────────────────────────────────────────────

/// Runtime lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Created,
    Validated,
    Streaming,
    Closed,
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginState::Created => write!(f, "created"),
            PluginState::Validated => write!(f, "validated"),
            PluginState::Streaming => write!(f, "streaming"),
            PluginState::Closed => write!(f, "closed"),
        }
    }
}

/// Errors returned by lifecycle calls.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: PluginState,
    },

    #[error("incoming connection has no fields")]
    EmptySchema,
}

impl From<PluginError> for ca_common::Error {
    fn from(err: PluginError) -> Self {
        match err {
            PluginError::Validation(errors) => errors.into(),
            PluginError::InvalidState { action, state } => ca_common::Error::InvalidState {
                action: action.to_string(),
                state: state.to_string(),
            },
            PluginError::EmptySchema => ca_common::Error::InvalidField(err.to_string()),
        }
    }
}

// ── Plugin ──────────────────────────────────────────────────────────────

/// CSV append tool: validates settings, buffers records, appends in chunks.
#[derive(Debug)]
pub struct CsvAppendPlugin<L: EngineLink> {
    link: L,
    state: PluginState,
    enabled: bool,
    base_dir: Option<PathBuf>,
    batch_size: usize,
    appender: Option<CsvAppender>,
    buffers: Option<ColumnBuffers>,
    /// Records pushed since the last automatic flush attempt.
    pending: usize,
    rows_appended: u64,
    flushes: u64,
    failed_flushes: u64,
    retention_warned: bool,
}

impl<L: EngineLink> CsvAppendPlugin<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            state: PluginState::Created,
            enabled: true,
            base_dir: None,
            batch_size: CHUNK_SIZE,
            appender: None,
            buffers: None,
            pending: 0,
            rows_appended: 0,
            flushes: 0,
            failed_flushes: 0,
            retention_warned: false,
        }
    }

    /// Resolve relative output paths against `dir` instead of the working
    /// directory.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Override the automatic flush threshold (minimum 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    // ── Host calls ──────────────────────────────────────────────────────

    /// Validate the settings blob. Created → Validated.
    ///
    /// Every validation message is reported to the host and the plugin is
    /// disabled for the rest of the stream on failure.
    pub fn initialize(&mut self, raw: &RawSettings) -> Result<(), PluginError> {
        self.expect_state(PluginState::Created, "initialize")?;
        self.state = PluginState::Validated;

        let result = match &self.base_dir {
            Some(dir) => validate_in(raw, dir),
            None => validate(raw),
        };

        match result {
            Ok(config) => {
                info!(
                    path = %config.target_path().display(),
                    delimiter = %char::from(config.delimiter()),
                    quote = %config.quote(),
                    code_page = %config.code_page(),
                    line_ending = %config.line_ending(),
                    "settings validated"
                );
                self.appender = Some(CsvAppender::new(config));
                Ok(())
            }
            Err(errors) => {
                warn!(failures = errors.len(), "settings rejected: {errors}");
                for error in &errors {
                    self.link.notify(Notice::Error(error.to_string()));
                }
                self.enabled = false;
                Err(errors.into())
            }
        }
    }

    /// Accept the incoming record shape. Validated → Streaming.
    pub fn bind_schema(&mut self, schema: FieldSchema) -> Result<(), PluginError> {
        self.expect_state(PluginState::Validated, "bind schema")?;
        self.state = PluginState::Streaming;

        if schema.is_empty() {
            self.disable(PluginError::EmptySchema.to_string());
            return Err(PluginError::EmptySchema);
        }

        debug!(fields = schema.len(), "schema bound");
        self.buffers = Some(ColumnBuffers::bind(&schema));
        self.pending = 0;
        Ok(())
    }

    /// Buffer one record, flushing when the batch threshold is reached.
    ///
    /// Returns `false` without buffering when the plugin is disabled or not
    /// streaming. A failed flush is reported but does not fail the push.
    pub fn push_record<R: Record + ?Sized>(&mut self, record: &R) -> bool {
        if !self.enabled || self.state != PluginState::Streaming {
            return false;
        }
        let Some(buffers) = self.buffers.as_mut() else {
            return false;
        };

        buffers.push(record);
        self.pending += 1;

        if self.pending >= self.batch_size {
            self.pending = 0;
            let rows = self.buffered_rows();
            if self.flush() {
                self.link.notify(Notice::Info(format!(
                    "Appended {rows} records to {}",
                    self.target_display()
                )));
            }
        }
        true
    }

    /// Forward upstream progress unchanged, clamped to `[0.0, 1.0]`.
    pub fn update_progress(&mut self, fraction: f64) {
        self.link.progress(fraction.clamp(0.0, 1.0));
    }

    /// Called by a host that has no incoming connection to offer.
    pub fn push_all_records(&mut self) -> bool {
        self.disable("Missing Incoming Connection".to_string());
        false
    }

    /// Drain any partial chunk and finish. Any state → Closed.
    ///
    /// Returns `false` only if buffered rows could not be written.
    pub fn close(&mut self) -> bool {
        if self.state == PluginState::Closed {
            return true;
        }
        let streaming = self.state == PluginState::Streaming;
        self.state = PluginState::Closed;

        if !(streaming && self.enabled) {
            self.buffers = None;
            return true;
        }

        let written = self.flush();
        if written {
            let path = self.target_display();
            self.link.notify(Notice::FileOutput(format!(
                "{path} | Records were appended to {path}"
            )));
        } else {
            warn!(
                lost_rows = self.buffered_rows(),
                "closing with rows that could not be appended"
            );
        }
        info!(
            rows = self.rows_appended,
            flushes = self.flushes,
            failed_flushes = self.failed_flushes,
            "stream closed"
        );
        self.buffers = None;
        written
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn state(&self) -> PluginState {
        self.state
    }

    /// False once validation (or another fatal host error) has failed.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn config(&self) -> Option<&FormatConfig> {
        self.appender.as_ref().map(CsvAppender::config)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Rows held in memory, including any kept after a failed flush.
    pub fn buffered_rows(&self) -> usize {
        self.buffers.as_ref().map_or(0, ColumnBuffers::row_count)
    }

    pub fn rows_appended(&self) -> u64 {
        self.rows_appended
    }

    /// Successful flushes that wrote at least one row.
    pub fn flush_count(&self) -> u64 {
        self.flushes
    }

    pub fn failed_flushes(&self) -> u64 {
        self.failed_flushes
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn expect_state(&self, expected: PluginState, action: &'static str) -> Result<(), PluginError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(PluginError::InvalidState {
                action,
                state: self.state,
            })
        }
    }

    fn disable(&mut self, message: String) {
        warn!("{message}");
        self.link.notify(Notice::Error(message));
        self.enabled = false;
    }

    fn target_display(&self) -> String {
        self.config()
            .map(|c| c.target_path().display().to_string())
            .unwrap_or_default()
    }

    /// Append everything buffered. Rows are cleared only after a confirmed
    /// write; on failure they stay buffered for the next attempt.
    fn flush(&mut self) -> bool {
        let (Some(appender), Some(buffers)) = (self.appender.as_ref(), self.buffers.as_mut()) else {
            return true;
        };

        match appender.append(buffers) {
            Ok(0) => true,
            Ok(rows) => {
                buffers.clear();
                self.rows_appended += rows as u64;
                self.flushes += 1;
                debug!(rows, total = self.rows_appended, "flushed chunk");
                true
            }
            Err(err) => {
                self.failed_flushes += 1;
                let retained = buffers.row_count();
                warn!(error = %err, retained, "flush failed, rows kept for retry");
                self.link.notify(Notice::Error(err.to_string()));

                let limit = self.batch_size.saturating_mul(RETAINED_CHUNKS_WARN);
                if retained > limit && !self.retention_warned {
                    self.retention_warned = true;
                    warn!(retained, limit, "retained rows exceed the chunk budget");
                    self.link.notify(Notice::Info(format!(
                        "{retained} records are held in memory waiting to be appended to {}",
                        appender.config().target_path().display()
                    )));
                }
                false
            }
        }
    }
}
