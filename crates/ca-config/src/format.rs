//! Normalized CSV formatting parameters.

use encoding_rs::Encoding;
use std::fmt;
use std::path::{Path, PathBuf};

/// Which fields receive surrounding quote characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotePolicy {
    /// Quote only fields that need it (delimiter, quote, or line break inside).
    Minimal,
    /// Quote every field that does not read as a number.
    NonNumeric,
    /// Never quote; special characters are backslash-escaped instead.
    Never,
    /// Quote every field.
    All,
}

impl QuotePolicy {
    /// Map the GUI's `quote` setting. Unrecognised values quote everything.
    pub fn from_setting(value: &str) -> Self {
        match value {
            "auto" => QuotePolicy::Minimal,
            "text" => QuotePolicy::NonNumeric,
            "none" => QuotePolicy::Never,
            _ => QuotePolicy::All,
        }
    }
}

impl fmt::Display for QuotePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotePolicy::Minimal => write!(f, "minimal"),
            QuotePolicy::NonNumeric => write!(f, "non_numeric"),
            QuotePolicy::Never => write!(f, "never"),
            QuotePolicy::All => write!(f, "all"),
        }
    }
}

/// Row terminator style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    /// `\r\n`
    Windows,
    /// `\n`
    Unix,
    /// `\r`
    LegacyMac,
}

impl LineEnding {
    /// Map the GUI's `newline` setting. Unrecognised values fall back to CR.
    pub fn from_setting(value: &str) -> Self {
        match value {
            "windows" => LineEnding::Windows,
            "unix" => LineEnding::Unix,
            _ => LineEnding::LegacyMac,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Windows => "\r\n",
            LineEnding::Unix => "\n",
            LineEnding::LegacyMac => "\r",
        }
    }
}

impl fmt::Display for LineEnding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineEnding::Windows => write!(f, "windows"),
            LineEnding::Unix => write!(f, "unix"),
            LineEnding::LegacyMac => write!(f, "legacy_mac"),
        }
    }
}

/// Output character encoding.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CodePage(&'static Encoding);

impl CodePage {
    pub fn utf8() -> Self {
        CodePage(encoding_rs::UTF_8)
    }

    /// Resolve a code page label such as `utf-8`, `latin1` or `cp1252`.
    ///
    /// Labels that are unknown as given are retried with underscores read as
    /// hyphens (`utf_8`). Encodings that can only be decoded, not written
    /// (UTF-16, `replacement`), are refused.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        let encoding = Encoding::for_label(label.as_bytes())
            .or_else(|| Encoding::for_label(label.replace('_', "-").as_bytes()))?;
        if encoding.output_encoding() != encoding {
            return None;
        }
        Some(CodePage(encoding))
    }

    pub fn encoding(self) -> &'static Encoding {
        self.0
    }

    /// Canonical encoding name.
    pub fn name(self) -> &'static str {
        self.0.name()
    }

    pub fn is_utf8(self) -> bool {
        self.0 == encoding_rs::UTF_8
    }
}

impl fmt::Debug for CodePage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CodePage").field(&self.name()).finish()
    }
}

impl fmt::Display for CodePage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Validated formatting parameters and target file.
///
/// Only the validator constructs this; it is immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatConfig {
    delimiter: u8,
    quote: QuotePolicy,
    code_page: CodePage,
    line_ending: LineEnding,
    target_path: PathBuf,
}

impl FormatConfig {
    pub(crate) fn new(
        delimiter: u8,
        quote: QuotePolicy,
        code_page: CodePage,
        line_ending: LineEnding,
        target_path: PathBuf,
    ) -> Self {
        Self {
            delimiter,
            quote,
            code_page,
            line_ending,
            target_path,
        }
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    pub fn quote(&self) -> QuotePolicy {
        self.quote
    }

    pub fn code_page(&self) -> CodePage {
        self.code_page
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_setting_table() {
        assert_eq!(QuotePolicy::from_setting("auto"), QuotePolicy::Minimal);
        assert_eq!(QuotePolicy::from_setting("text"), QuotePolicy::NonNumeric);
        assert_eq!(QuotePolicy::from_setting("none"), QuotePolicy::Never);
        assert_eq!(QuotePolicy::from_setting("always"), QuotePolicy::All);
        assert_eq!(QuotePolicy::from_setting("AUTO"), QuotePolicy::All);
    }

    #[test]
    fn newline_setting_table() {
        assert_eq!(LineEnding::from_setting("windows").as_str(), "\r\n");
        assert_eq!(LineEnding::from_setting("unix").as_str(), "\n");
        assert_eq!(LineEnding::from_setting("mac").as_str(), "\r");
        assert_eq!(LineEnding::from_setting("").as_str(), "\r");
    }

    #[test]
    fn code_page_labels() {
        assert!(CodePage::from_label("utf-8").unwrap().is_utf8());
        assert!(CodePage::from_label("UTF_8").unwrap().is_utf8());
        assert_eq!(CodePage::from_label("latin1").unwrap().name(), "windows-1252");
        assert_eq!(CodePage::from_label("cp1252").unwrap().name(), "windows-1252");
        assert_eq!(CodePage::from_label("shift_jis").unwrap().name(), "Shift_JIS");
    }

    #[test]
    fn code_page_rejects_unknown_and_decode_only() {
        assert!(CodePage::from_label("klingon").is_none());
        assert!(CodePage::from_label("utf-16le").is_none());
        assert!(CodePage::from_label("utf-16").is_none());
        assert!(CodePage::from_label("").is_none());
    }
}
