//! CSV Append settings parsing and validation.
//!
//! This crate provides:
//! - The raw settings blob handed over by the configuration GUI (XML or JSON)
//! - Validation of path, delimiter, quoting, code page and line ending
//! - The immutable [`FormatConfig`] the writer runs with

pub mod format;
pub mod settings;
pub mod validate;

pub use format::{CodePage, FormatConfig, LineEnding, QuotePolicy};
pub use settings::{RawSettings, SettingKey, SettingsError};
pub use validate::{
    validate, validate_in, ValidationError, ValidationErrors, MAX_PATH_LEN, RESERVED_PATH_CHARS,
};
