//! Per-field column buffers.
//!
//! Each field of the bound schema owns one [`FieldBuffer`]: the field name,
//! kept as the column header for the life of the stream, followed by the
//! rendered values of every record buffered since the last successful flush.
//! The header is bookkeeping only and is never written to the output file.

use ca_common::{FieldSchema, FieldType};

use crate::record::{format_bool, format_double, Record};

/// Which host getter reads a field, resolved once at schema bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessor {
    Int32,
    Int64,
    Double,
    Bool,
    Text,
}

impl Accessor {
    /// Read and render one value; `None` for null.
    pub fn extract<R: Record + ?Sized>(self, record: &R, index: usize) -> Option<String> {
        match self {
            Accessor::Int32 => record.get_int32(index).map(|v| v.to_string()),
            Accessor::Int64 => record.get_int64(index).map(|v| v.to_string()),
            Accessor::Double => record.get_double(index).map(format_double),
            Accessor::Bool => record.get_bool(index).map(|v| format_bool(v).to_string()),
            Accessor::Text => record.get_string(index).map(|v| v.into_owned()),
        }
    }
}

impl From<FieldType> for Accessor {
    fn from(ty: FieldType) -> Self {
        match ty {
            FieldType::Byte | FieldType::Int16 | FieldType::Int32 => Accessor::Int32,
            FieldType::Int64 => Accessor::Int64,
            FieldType::FixedDecimal | FieldType::Float | FieldType::Double => Accessor::Double,
            FieldType::Bool => Accessor::Bool,
            FieldType::String
            | FieldType::WString
            | FieldType::VString
            | FieldType::VWString
            | FieldType::Date
            | FieldType::Time
            | FieldType::DateTime
            | FieldType::Blob
            | FieldType::SpatialObj => Accessor::Text,
        }
    }
}

/// Buffered values of one field.
#[derive(Debug, Clone)]
pub struct FieldBuffer {
    header: String,
    accessor: Accessor,
    values: Vec<String>,
}

impl FieldBuffer {
    pub fn new(header: impl Into<String>, accessor: Accessor) -> Self {
        Self {
            header: header.into(),
            accessor,
            values: Vec::new(),
        }
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn accessor(&self) -> Accessor {
        self.accessor
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Drop buffered values, keeping the header.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// All field buffers of a bound schema, kept at equal length.
#[derive(Debug, Clone)]
pub struct ColumnBuffers {
    columns: Vec<FieldBuffer>,
    rows: usize,
}

impl ColumnBuffers {
    /// One buffer per schema field, in schema order.
    pub fn bind(schema: &FieldSchema) -> Self {
        let columns = schema
            .iter()
            .map(|field| FieldBuffer::new(field.name.clone(), field.field_type.into()))
            .collect();
        Self { columns, rows: 0 }
    }

    /// Append one record; a null value is buffered as an empty string.
    pub fn push<R: Record + ?Sized>(&mut self, record: &R) {
        for (index, column) in self.columns.iter_mut().enumerate() {
            let value = column.accessor.extract(record, index).unwrap_or_default();
            column.values.push(value);
        }
        self.rows += 1;
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[FieldBuffer] {
        &self.columns
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(FieldBuffer::header)
    }

    /// Buffered rows, reading each column positionally.
    pub fn rows(&self) -> impl Iterator<Item = impl Iterator<Item = &str>> {
        (0..self.rows).map(move |i| self.columns.iter().map(move |c| c.values[i].as_str()))
    }

    /// Drop all buffered rows, keeping headers.
    pub fn clear(&mut self) {
        self.columns.iter_mut().for_each(FieldBuffer::clear);
        self.rows = 0;
    }
}
