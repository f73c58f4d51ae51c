//! Append buffered rows to the target CSV file.
//!
//! A flush renders every buffered row into memory with the configured
//! dialect, encodes the result into the configured code page, and appends it
//! to the target in one write. The file is opened and closed within each
//! flush and is never created or truncated: it must already carry its header.

use std::borrow::Cow;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use ca_config::{FormatConfig, LineEnding, QuotePolicy};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use thiserror::Error;
use tracing::debug;

use crate::buffer::{Accessor, ColumnBuffers, FieldBuffer};

const QUOTE: u8 = b'"';
const ESCAPE: u8 = b'\\';

/// Errors from a single flush.
#[derive(Debug, Error)]
pub enum FlushError {
    #[error("failed to render CSV rows: {0}")]
    Render(#[from] csv::Error),

    #[error("failed to render CSV rows: {0}")]
    RenderIo(std::io::Error),

    #[error("rendered rows are not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("text contains characters that cannot be encoded as {code_page}")]
    Unmappable { code_page: &'static str },

    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<FlushError> for ca_common::Error {
    fn from(err: FlushError) -> Self {
        match err {
            FlushError::Unmappable { .. } | FlushError::Utf8(_) => {
                ca_common::Error::Encoding(err.to_string())
            }
            other => ca_common::Error::Flush(other.to_string()),
        }
    }
}

/// Writes buffered rows with one validated format.
#[derive(Debug, Clone)]
pub struct CsvAppender {
    config: FormatConfig,
}

impl CsvAppender {
    pub fn new(config: FormatConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FormatConfig {
        &self.config
    }

    /// Append every buffered row to the target file.
    ///
    /// Returns the number of rows written. The buffers are not touched; the
    /// caller clears them once the append is confirmed.
    pub fn append(&self, buffers: &ColumnBuffers) -> Result<usize, FlushError> {
        let rows = buffers.row_count();
        if rows == 0 {
            return Ok(0);
        }

        let rendered = self.render(buffers)?;
        let encoded = self.encode(&rendered)?;
        let path = self.config.target_path();

        let mut file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|source| FlushError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        file.write_all(&encoded)
            .and_then(|()| file.flush())
            .map_err(|source| FlushError::Write {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(
            path = %path.display(),
            rows,
            bytes = encoded.len(),
            code_page = %self.config.code_page(),
            "appended rows"
        );
        Ok(rows)
    }

    /// Render rows as UTF-8 CSV text.
    pub fn render(&self, buffers: &ColumnBuffers) -> Result<Vec<u8>, FlushError> {
        let delimiter = self.config.delimiter();
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .quote(QUOTE)
            .escape(ESCAPE)
            .double_quote(false)
            .quote_style(quote_style(self.config.quote()))
            .terminator(terminator(self.config.line_ending()))
            .from_writer(Vec::new());

        let accessors: Vec<Accessor> =
            buffers.columns().iter().map(FieldBuffer::accessor).collect();
        for row in buffers.rows() {
            match self.config.quote() {
                QuotePolicy::Never => {
                    writer.write_record(row.map(|field| escape_field(field, delimiter)))?
                }
                QuotePolicy::NonNumeric => writer.write_record(
                    row.zip(&accessors)
                        .map(|(field, accessor)| quote_by_type(field, *accessor)),
                )?,
                QuotePolicy::Minimal | QuotePolicy::All => writer.write_record(row)?,
            }
        }

        writer
            .into_inner()
            .map_err(|e| FlushError::RenderIo(e.into_error()))
    }

    fn encode<'a>(&self, rendered: &'a [u8]) -> Result<Cow<'a, [u8]>, FlushError> {
        let code_page = self.config.code_page();
        if code_page.is_utf8() {
            return Ok(Cow::Borrowed(rendered));
        }
        let text = std::str::from_utf8(rendered)?;
        let (bytes, _, had_unmappable) = code_page.encoding().encode(text);
        if had_unmappable {
            return Err(FlushError::Unmappable {
                code_page: code_page.name(),
            });
        }
        Ok(Cow::Owned(bytes.into_owned()))
    }
}

fn quote_style(policy: QuotePolicy) -> QuoteStyle {
    match policy {
        QuotePolicy::Minimal => QuoteStyle::Necessary,
        // Quoted per declared type in `quote_by_type`.
        QuotePolicy::NonNumeric => QuoteStyle::Never,
        QuotePolicy::Never => QuoteStyle::Never,
        QuotePolicy::All => QuoteStyle::Always,
    }
}

fn terminator(line_ending: LineEnding) -> Terminator {
    match line_ending {
        LineEnding::Windows => Terminator::CRLF,
        LineEnding::Unix => Terminator::Any(b'\n'),
        LineEnding::LegacyMac => Terminator::Any(b'\r'),
    }
}

/// Backslash-escape characters that would otherwise break an unquoted field.
fn escape_field(field: &str, delimiter: u8) -> Cow<'_, [u8]> {
    let needs_escape =
        |b: u8| b == delimiter || b == QUOTE || b == ESCAPE || b == b'\r' || b == b'\n';
    if !field.bytes().any(needs_escape) {
        return Cow::Borrowed(field.as_bytes());
    }
    let mut escaped = Vec::with_capacity(field.len() + 4);
    for b in field.bytes() {
        if needs_escape(b) {
            escaped.push(ESCAPE);
        }
        escaped.push(b);
    }
    Cow::Owned(escaped)
}

/// Quote text columns and nulls; numeric and boolean values stay bare.
///
/// Inside quotes the quote and escape characters are backslash-escaped.
fn quote_by_type(field: &str, accessor: Accessor) -> Cow<'_, [u8]> {
    if accessor != Accessor::Text && !field.is_empty() {
        return Cow::Borrowed(field.as_bytes());
    }
    let mut quoted = Vec::with_capacity(field.len() + 2);
    quoted.push(QUOTE);
    for b in field.bytes() {
        if b == QUOTE || b == ESCAPE {
            quoted.push(ESCAPE);
        }
        quoted.push(b);
    }
    quoted.push(QUOTE);
    Cow::Owned(quoted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;
    use ca_common::{FieldDef, FieldSchema, FieldType};
    use ca_config::{validate_in, RawSettings};
    use tempfile::TempDir;

    fn appender(
        dir: &TempDir,
        delimiter: &str,
        quote: &str,
        newline: &str,
        codepage: &str,
    ) -> CsvAppender {
        let path = dir.path().join("out.csv");
        if !path.exists() {
            std::fs::write(&path, "").unwrap();
        }
        let raw = RawSettings::from_pairs([
            ("fileOutputPath", "out.csv"),
            ("delimiter", delimiter),
            ("quote", quote),
            ("codepage", codepage),
            ("newline", newline),
        ]);
        CsvAppender::new(validate_in(&raw, dir.path()).unwrap())
    }

    fn buffers(rows: &[(&str, Option<&str>)]) -> ColumnBuffers {
        let schema = FieldSchema::new(vec![
            FieldDef::new("id", FieldType::String),
            FieldDef::new("name", FieldType::String),
        ]);
        let mut buffers = ColumnBuffers::bind(&schema);
        for (id, name) in rows {
            buffers.push(&vec![FieldValue::from(*id), FieldValue::from(*name)]);
        }
        buffers
    }

    fn render(
        delimiter: &str,
        quote: &str,
        newline: &str,
        rows: &[(&str, Option<&str>)],
    ) -> String {
        let dir = tempfile::tempdir().unwrap();
        let appender = appender(&dir, delimiter, quote, newline, "utf-8");
        String::from_utf8(appender.render(&buffers(rows)).unwrap()).unwrap()
    }

    #[test]
    fn minimal_quoting_quotes_only_when_needed() {
        let out = render(",", "auto", "unix", &[("1", Some("plain")), ("2", Some("a,b"))]);
        assert_eq!(out, "1,plain\n2,\"a,b\"\n");
    }

    #[test]
    fn embedded_quotes_are_backslash_escaped() {
        let out = render(",", "auto", "unix", &[("1", Some("say \"hi\""))]);
        assert_eq!(out, "1,\"say \\\"hi\\\"\"\n");
    }

    #[test]
    fn all_quoting() {
        let out = render(";", "anything", "windows", &[("1", Some("x"))]);
        assert_eq!(out, "\"1\";\"x\"\r\n");
    }

    fn render_typed(quote: &str, schema: FieldSchema, rows: &[Vec<FieldValue>]) -> String {
        let dir = tempfile::tempdir().unwrap();
        let appender = appender(&dir, ",", quote, "unix", "utf-8");
        let mut buffers = ColumnBuffers::bind(&schema);
        for row in rows {
            buffers.push(row);
        }
        String::from_utf8(appender.render(&buffers).unwrap()).unwrap()
    }

    fn zip_ok_x() -> FieldSchema {
        FieldSchema::new(vec![
            FieldDef::new("zip", FieldType::String),
            FieldDef::new("ok", FieldType::Bool),
            FieldDef::new("x", FieldType::Double),
            FieldDef::new("n", FieldType::Int32),
        ])
    }

    #[test]
    fn text_quoting_follows_declared_type() {
        let out = render_typed(
            "text",
            zip_ok_x(),
            &[vec![
                FieldValue::from("02134"),
                FieldValue::from(true),
                FieldValue::from(1e16),
                FieldValue::from(7),
            ]],
        );
        assert_eq!(out, "\"02134\",True,1e+16,7\n");
    }

    #[test]
    fn text_quoting_quotes_nulls_and_escapes() {
        let out = render_typed(
            "text",
            zip_ok_x(),
            &[vec![
                FieldValue::from("say \"hi\", a\\b"),
                FieldValue::Null,
                FieldValue::from(2.5),
                FieldValue::Null,
            ]],
        );
        assert_eq!(out, "\"say \\\"hi\\\", a\\\\b\",\"\",2.5,\"\"\n");
    }

    #[test]
    fn never_quoting_escapes_specials() {
        let out = render(",", "none", "unix", &[("1", Some("a,b\"c\\d"))]);
        assert_eq!(out, "1,a\\,b\\\"c\\\\d\n");
    }

    #[test]
    fn legacy_mac_terminator() {
        let out = render("|", "none", "mac", &[("1", Some("a")), ("2", Some("b"))]);
        assert_eq!(out, "1|a\r2|b\r");
    }

    #[test]
    fn append_keeps_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "id,name\n").unwrap();
        let appender = appender(&dir, ",", "none", "unix", "utf-8");

        let written = appender
            .append(&buffers(&[("1", Some("a")), ("2", Some("b"))]))
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "id,name\n1,a\n2,b\n");
    }

    #[test]
    fn append_with_nothing_buffered_does_not_touch_file() {
        let dir = tempfile::tempdir().unwrap();
        let appender = appender(&dir, ",", "none", "unix", "utf-8");
        std::fs::remove_file(dir.path().join("out.csv")).unwrap();
        assert_eq!(appender.append(&buffers(&[])).unwrap(), 0);
        assert!(!dir.path().join("out.csv").exists());
    }

    #[test]
    fn encodes_into_code_page() {
        let dir = tempfile::tempdir().unwrap();
        let appender = appender(&dir, ",", "none", "unix", "latin1");
        appender.append(&buffers(&[("1", Some("café"))])).unwrap();
        let bytes = std::fs::read(dir.path().join("out.csv")).unwrap();
        assert_eq!(bytes, b"1,caf\xe9\n");
    }

    #[test]
    fn unmappable_character_fails_flush() {
        let dir = tempfile::tempdir().unwrap();
        let appender = appender(&dir, ",", "none", "unix", "latin1");
        let err = appender.append(&buffers(&[("1", Some("日本"))])).unwrap_err();
        assert!(matches!(err, FlushError::Unmappable { code_page: "windows-1252" }));
        assert_eq!(std::fs::read(dir.path().join("out.csv")).unwrap(), b"");
    }

    #[test]
    fn missing_target_at_flush_time() {
        let dir = tempfile::tempdir().unwrap();
        let appender = appender(&dir, ",", "none", "unix", "utf-8");
        std::fs::remove_file(dir.path().join("out.csv")).unwrap();

        let err = appender.append(&buffers(&[("1", Some("a"))])).unwrap_err();
        assert!(matches!(err, FlushError::Open { .. }));
        assert!(!dir.path().join("out.csv").exists(), "flush must not create the file");

        let common: ca_common::Error = err.into();
        assert_eq!(common.code(), 30);
    }
}
