//! Raw settings blob as produced by the configuration GUI.
//!
//! The GUI hands over a flat key-value document (XML in practice, JSON for
//! scripted hosts). Nothing here is validated: a missing key simply reads as
//! an empty string and the validator decides what that means.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors from reading or parsing a settings blob.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed settings JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<SettingsError> for ca_common::Error {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::Io { .. } => ca_common::Error::Config(err.to_string()),
            SettingsError::Xml(_) | SettingsError::Json(_) => {
                ca_common::Error::InvalidSettings(err.to_string())
            }
        }
    }
}

/// Known settings keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    FileOutputPath,
    Delimiter,
    Quote,
    CodePage,
    Newline,
}

impl SettingKey {
    pub const ALL: [SettingKey; 5] = [
        SettingKey::FileOutputPath,
        SettingKey::Delimiter,
        SettingKey::Quote,
        SettingKey::CodePage,
        SettingKey::Newline,
    ];

    /// Key name as it appears in the settings blob.
    pub fn as_str(self) -> &'static str {
        match self {
            SettingKey::FileOutputPath => "fileOutputPath",
            SettingKey::Delimiter => "delimiter",
            SettingKey::Quote => "quote",
            SettingKey::CodePage => "codepage",
            SettingKey::Newline => "newline",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

/// Unvalidated settings, one string per key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSettings {
    #[serde(rename = "fileOutputPath")]
    pub file_output_path: String,
    pub delimiter: String,
    pub quote: String,
    pub codepage: String,
    pub newline: String,
}

impl RawSettings {
    /// Value for `key`.
    pub fn get(&self, key: SettingKey) -> &str {
        match key {
            SettingKey::FileOutputPath => &self.file_output_path,
            SettingKey::Delimiter => &self.delimiter,
            SettingKey::Quote => &self.quote,
            SettingKey::CodePage => &self.codepage,
            SettingKey::Newline => &self.newline,
        }
    }

    /// Overwrite the value for `key`.
    pub fn set(&mut self, key: SettingKey, value: impl Into<String>) {
        let slot = match key {
            SettingKey::FileOutputPath => &mut self.file_output_path,
            SettingKey::Delimiter => &mut self.delimiter,
            SettingKey::Quote => &mut self.quote,
            SettingKey::CodePage => &mut self.codepage,
            SettingKey::Newline => &mut self.newline,
        };
        *slot = value.into();
    }

    /// Build from key-value pairs. Unknown keys are ignored; later pairs win.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut settings = Self::default();
        for (key, value) in pairs {
            if let Some(key) = SettingKey::from_name(key.as_ref()) {
                settings.set(key, value);
            }
        }
        settings
    }

    /// Parse a flat JSON object.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse the GUI's XML blob.
    ///
    /// Elements named after a settings key are picked up wherever they sit
    /// under the root. Text is kept verbatim (no trimming), so a space or tab
    /// delimiter survives.
    pub fn from_xml(xml: &str) -> Result<Self, SettingsError> {
        let mut reader = Reader::from_str(xml);
        let mut settings = Self::default();
        let mut current: Option<(SettingKey, String)> = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                    current = SettingKey::from_name(&name).map(|key| (key, String::new()));
                }
                Event::Text(text) => {
                    if let Some((_, value)) = current.as_mut() {
                        value.push_str(&text.unescape()?);
                    }
                }
                Event::CData(data) => {
                    if let Some((_, value)) = current.as_mut() {
                        value.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::End(_) => {
                    if let Some((key, value)) = current.take() {
                        settings.set(key, value);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(settings)
    }

    /// Load a settings file, choosing the parser from the extension or, failing
    /// that, from the first non-blank character.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let is_xml = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("xml") => true,
            Some(ext) if ext.eq_ignore_ascii_case("json") => false,
            _ => content.trim_start().starts_with('<'),
        };

        if is_xml {
            Self::from_xml(&content)
        } else {
            Self::from_json(&content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const GUI_XML: &str = r#"<Configuration>
  <fileOutputPath>sales.csv</fileOutputPath>
  <delimiter>;</delimiter>
  <quote>auto</quote>
  <codepage>utf-8</codepage>
  <newline>windows</newline>
</Configuration>"#;

    #[test]
    fn parses_gui_xml() {
        let settings = RawSettings::from_xml(GUI_XML).unwrap();
        assert_eq!(settings.file_output_path, "sales.csv");
        assert_eq!(settings.delimiter, ";");
        assert_eq!(settings.quote, "auto");
        assert_eq!(settings.codepage, "utf-8");
        assert_eq!(settings.newline, "windows");
    }

    #[test]
    fn xml_missing_and_empty_elements_read_as_empty() {
        let xml = "<Configuration><fileOutputPath/><delimiter></delimiter></Configuration>";
        let settings = RawSettings::from_xml(xml).unwrap();
        assert_eq!(settings, RawSettings::default());
    }

    #[test]
    fn xml_keeps_whitespace_delimiter_and_unescapes() {
        let xml = "<c><delimiter> </delimiter><fileOutputPath>a&amp;b.csv</fileOutputPath></c>";
        let settings = RawSettings::from_xml(xml).unwrap();
        assert_eq!(settings.delimiter, " ");
        assert_eq!(settings.file_output_path, "a&b.csv");
    }

    #[test]
    fn xml_ignores_unknown_elements() {
        let xml = "<c><other>x</other><quote>none</quote></c>";
        let settings = RawSettings::from_xml(xml).unwrap();
        assert_eq!(settings.quote, "none");
        assert_eq!(settings.delimiter, "");
    }

    #[test]
    fn malformed_xml_is_an_error() {
        let err = RawSettings::from_xml("<c><quote>auto</delimiter></c>").unwrap_err();
        assert!(matches!(err, SettingsError::Xml(_)));
    }

    #[test]
    fn parses_json_with_missing_keys() {
        let settings = RawSettings::from_json(r#"{"fileOutputPath":"out.csv","quote":"text"}"#)
            .unwrap();
        assert_eq!(settings.file_output_path, "out.csv");
        assert_eq!(settings.quote, "text");
        assert_eq!(settings.delimiter, "");
    }

    #[test]
    fn from_pairs_ignores_unknown_keys() {
        let settings = RawSettings::from_pairs([
            ("delimiter", "|"),
            ("colour", "blue"),
            ("newline", "unix"),
        ]);
        assert_eq!(settings.get(SettingKey::Delimiter), "|");
        assert_eq!(settings.get(SettingKey::Newline), "unix");
    }

    #[test]
    fn load_detects_format() {
        let dir = tempfile::tempdir().unwrap();

        let xml_path = dir.path().join("settings.xml");
        std::fs::write(&xml_path, GUI_XML).unwrap();
        assert_eq!(RawSettings::load(&xml_path).unwrap().delimiter, ";");

        let sniffed = dir.path().join("settings.cfg");
        let mut f = std::fs::File::create(&sniffed).unwrap();
        writeln!(f, "  {}", GUI_XML).unwrap();
        assert_eq!(RawSettings::load(&sniffed).unwrap().quote, "auto");

        let json_path = dir.path().join("settings.json");
        std::fs::write(&json_path, r#"{"codepage":"latin1"}"#).unwrap();
        assert_eq!(RawSettings::load(&json_path).unwrap().codepage, "latin1");
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RawSettings::load(&dir.path().join("nope.xml")).unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }
}
