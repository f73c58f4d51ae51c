//! Settings validation.
//!
//! Every check runs, even after an earlier one has failed, so the host sees
//! the full list of problems. A host that surfaces one message per call shows
//! [`ValidationErrors::first`].

use std::fmt;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::format::{CodePage, FormatConfig, LineEnding, QuotePolicy};
use crate::settings::RawSettings;

/// Longest accepted output path, in characters.
pub const MAX_PATH_LEN: usize = 259;

/// Characters refused anywhere in the output path.
pub const RESERVED_PATH_CHARS: &str = "/;?*\"<>|";

/// A single failed check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Enter a filename")]
    MissingPath,

    #[error("Maximum path length is {max}")]
    PathTooLong { len: usize, max: usize },

    #[error("These characters are not allowed in the filename: /;?*\"<>|")]
    ReservedCharacter { ch: char },

    #[error("Enter a delimiter")]
    MissingDelimiter,

    #[error("Delimiter must be a single character (for example ; or | or , or : )")]
    DelimiterTooLong { len: usize },

    #[error("Delimiter must be a single-byte character")]
    NonAsciiDelimiter { ch: char },

    #[error("Enter a quoting type")]
    MissingQuote,

    #[error("Enter a Code Page")]
    MissingCodePage,

    #[error("Unknown code page: {0}")]
    UnknownCodePage(String),

    #[error("Enter a Line Ending Style")]
    MissingLineEnding,

    #[error("The output file {} does not exist", .0.display())]
    OutputMissing(PathBuf),

    #[error("The output file {} is not writable", .path.display())]
    OutputNotWritable { path: PathBuf, reason: String },
}

/// All failed checks, in check order. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn first(&self) -> &ValidationError {
        &self.0[0]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    pub fn contains(&self, error: &ValidationError) -> bool {
        self.0.contains(error)
    }

    /// Messages in check order.
    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }

    pub fn into_vec(self) -> Vec<ValidationError> {
        self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<ValidationErrors> for ca_common::Error {
    fn from(errors: ValidationErrors) -> Self {
        ca_common::Error::Validation(errors.to_string())
    }
}

/// Validate settings, resolving the output path against the working directory.
pub fn validate(raw: &RawSettings) -> Result<FormatConfig, ValidationErrors> {
    run_checks(raw, None)
}

/// Validate settings, resolving a relative output path against `base_dir`.
///
/// Character and length checks apply to the path as entered; only the
/// writability check and the resulting [`FormatConfig::target_path`] use the
/// resolved location.
pub fn validate_in(raw: &RawSettings, base_dir: &Path) -> Result<FormatConfig, ValidationErrors> {
    run_checks(raw, Some(base_dir))
}

fn run_checks(raw: &RawSettings, base_dir: Option<&Path>) -> Result<FormatConfig, ValidationErrors> {
    let mut errors = Vec::new();

    errors.extend(check_path(&raw.file_output_path));

    let delimiter = match check_delimiter(&raw.delimiter) {
        Ok(d) => Some(d),
        Err(e) => {
            errors.push(e);
            None
        }
    };

    if raw.quote.is_empty() {
        errors.push(ValidationError::MissingQuote);
    }

    let code_page = if raw.codepage.is_empty() {
        errors.push(ValidationError::MissingCodePage);
        None
    } else {
        let resolved = CodePage::from_label(&raw.codepage);
        if resolved.is_none() {
            errors.push(ValidationError::UnknownCodePage(raw.codepage.clone()));
        }
        resolved
    };

    if raw.newline.is_empty() {
        errors.push(ValidationError::MissingLineEnding);
    }

    let quote = QuotePolicy::from_setting(&raw.quote);
    let line_ending = LineEnding::from_setting(&raw.newline);

    let target_path = match base_dir {
        Some(base) => base.join(&raw.file_output_path),
        None => PathBuf::from(&raw.file_output_path),
    };
    if raw.file_output_path.is_empty() {
        errors.push(ValidationError::OutputMissing(target_path.clone()));
    } else {
        errors.extend(check_writable(&target_path));
    }

    debug!(
        path = %target_path.display(),
        %quote,
        %line_ending,
        failures = errors.len(),
        "validated settings"
    );

    match (delimiter, code_page) {
        (Some(delimiter), Some(code_page)) if errors.is_empty() => Ok(FormatConfig::new(
            delimiter,
            quote,
            code_page,
            line_ending,
            target_path,
        )),
        _ => Err(ValidationErrors(errors)),
    }
}

/// Path string checks; at most one error, first match wins.
fn check_path(path: &str) -> Option<ValidationError> {
    if path.is_empty() {
        return Some(ValidationError::MissingPath);
    }
    let len = path.chars().count();
    if len > MAX_PATH_LEN {
        return Some(ValidationError::PathTooLong {
            len,
            max: MAX_PATH_LEN,
        });
    }
    path.chars()
        .find(|c| RESERVED_PATH_CHARS.contains(*c))
        .map(|ch| ValidationError::ReservedCharacter { ch })
}

fn check_delimiter(delimiter: &str) -> Result<u8, ValidationError> {
    let mut chars = delimiter.chars();
    let ch = chars.next().ok_or(ValidationError::MissingDelimiter)?;
    if chars.next().is_some() {
        return Err(ValidationError::DelimiterTooLong {
            len: delimiter.chars().count(),
        });
    }
    u8::try_from(ch)
        .ok()
        .filter(u8::is_ascii)
        .ok_or(ValidationError::NonAsciiDelimiter { ch })
}

/// The output must already exist (it carries the header row) and be
/// appendable. The probe never creates or truncates the file.
fn check_writable(path: &Path) -> Option<ValidationError> {
    match OpenOptions::new().append(true).open(path) {
        Ok(_) => None,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Some(ValidationError::OutputMissing(path.to_path_buf()))
        }
        Err(e) => Some(ValidationError::OutputNotWritable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}
