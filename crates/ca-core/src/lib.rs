//! CSV Append core.
//!
//! Appends streamed records to an existing delimited text file. The host
//! drives a [`CsvAppendPlugin`] through `initialize → bind_schema →
//! push_record* → close`; records are buffered per field and appended to the
//! target in chunks of [`CHUNK_SIZE`] with the validated delimiter, quoting
//! policy, code page and line ending.
//!
//! Modules:
//! - [`record`]: typed record accessors and value rendering
//! - [`buffer`]: per-field column buffers
//! - [`writer`]: CSV rendering, encoding and append
//! - [`engine`]: notices and progress back to the host
//! - [`plugin`]: lifecycle state machine
//! - [`input`]: JSON Lines record source used by the CLI

pub mod buffer;
pub mod engine;
pub mod exit_codes;
pub mod input;
pub mod plugin;
pub mod record;
pub mod writer;

pub use buffer::{Accessor, ColumnBuffers, FieldBuffer};
pub use engine::{EngineLink, MemoryLink, Notice, TracingLink};
pub use exit_codes::ExitCode;
pub use input::JsonLinesReader;
pub use plugin::{CsvAppendPlugin, PluginError, PluginState, CHUNK_SIZE, RETAINED_CHUNKS_WARN};
pub use record::{FieldValue, Record};
pub use writer::{CsvAppender, FlushError};
