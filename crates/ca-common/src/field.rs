//! Host field schema model.
//!
//! The host engine describes every incoming connection with an ordered list
//! of named, typed fields. The schema arrives once, before the first record,
//! and never changes for the life of the stream.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Declared type of a host field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Bool,
    Byte,
    Int16,
    Int32,
    Int64,
    FixedDecimal,
    Float,
    Double,
    String,
    WString,
    #[serde(rename = "v_string")]
    VString,
    #[serde(rename = "v_wstring")]
    VWString,
    Date,
    Time,
    DateTime,
    Blob,
    SpatialObj,
}

impl FieldType {
    /// All field types, in declaration order.
    pub const ALL: [FieldType; 17] = [
        FieldType::Bool,
        FieldType::Byte,
        FieldType::Int16,
        FieldType::Int32,
        FieldType::Int64,
        FieldType::FixedDecimal,
        FieldType::Float,
        FieldType::Double,
        FieldType::String,
        FieldType::WString,
        FieldType::VString,
        FieldType::VWString,
        FieldType::Date,
        FieldType::Time,
        FieldType::DateTime,
        FieldType::Blob,
        FieldType::SpatialObj,
    ];

    /// Canonical lower-case name, as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Bool => "bool",
            FieldType::Byte => "byte",
            FieldType::Int16 => "int16",
            FieldType::Int32 => "int32",
            FieldType::Int64 => "int64",
            FieldType::FixedDecimal => "fixeddecimal",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::String => "string",
            FieldType::WString => "wstring",
            FieldType::VString => "v_string",
            FieldType::VWString => "v_wstring",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::DateTime => "datetime",
            FieldType::Blob => "blob",
            FieldType::SpatialObj => "spatialobj",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        FieldType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == needle)
            .ok_or_else(|| Error::UnknownFieldType(s.to_string()))
    }
}

/// A single named field of the incoming record shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }

    /// Parse a `NAME:TYPE` specification.
    ///
    /// The type is taken after the last colon so that field names may
    /// themselves contain colons.
    pub fn parse(spec: &str) -> Result<Self, Error> {
        let (name, ty) = spec
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidField(format!("expected NAME:TYPE, got '{spec}'")))?;
        if name.is_empty() {
            return Err(Error::InvalidField(format!("missing field name in '{spec}'")));
        }
        Ok(Self::new(name, ty.parse()?))
    }
}

impl FromStr for FieldDef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Ordered record shape for one incoming connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSchema {
    fields: Vec<FieldDef>,
}

impl FieldSchema {
    pub fn new(fields: Vec<FieldDef>) -> Self {
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FieldDef> {
        self.fields.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldDef> {
        self.fields.iter()
    }

    /// Field names in schema order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Position of the first field called `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

impl FromIterator<FieldDef> for FieldSchema {
    fn from_iter<I: IntoIterator<Item = FieldDef>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a FieldSchema {
    type Item = &'a FieldDef;
    type IntoIter = std::slice::Iter<'a, FieldDef>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
