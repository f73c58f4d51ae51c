//! JSON Lines record source for the CLI.
//!
//! Each non-blank line is one record: either an array of values in schema
//! order or an object keyed by field name. Missing values are null.

use std::io::BufRead;

use ca_common::{Error, FieldSchema, Result};
use serde_json::Value;

use crate::record::FieldValue;

/// Reads records line by line, tracking consumed bytes for progress.
pub struct JsonLinesReader<R> {
    reader: R,
    schema: FieldSchema,
    line: String,
    line_no: usize,
    bytes_read: u64,
}

impl<R: BufRead> JsonLinesReader<R> {
    pub fn new(reader: R, schema: FieldSchema) -> Self {
        Self {
            reader,
            schema,
            line: String::new(),
            line_no: 0,
            bytes_read: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Next record, or `None` at end of input.
    pub fn next_record(&mut self) -> Result<Option<Vec<FieldValue>>> {
        loop {
            self.line.clear();
            let n = self.reader.read_line(&mut self.line)?;
            if n == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            self.bytes_read += n as u64;

            let text = self.line.trim();
            if text.is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(text)
                .map_err(|e| Error::Record(format!("line {}: {e}", self.line_no)))?;
            return self.to_record(value).map(Some);
        }
    }

    fn to_record(&self, value: Value) -> Result<Vec<FieldValue>> {
        match value {
            Value::Array(values) => {
                let mut record: Vec<FieldValue> =
                    values.into_iter().map(FieldValue::from_json).collect();
                record.resize(self.schema.len().max(record.len()), FieldValue::Null);
                Ok(record)
            }
            Value::Object(mut map) => Ok(self
                .schema
                .names()
                .map(|name| map.remove(name).map_or(FieldValue::Null, FieldValue::from_json))
                .collect()),
            other => Err(Error::Record(format!(
                "line {}: expected an array or object, found {other}",
                self.line_no
            ))),
        }
    }
}

impl<R: BufRead> Iterator for JsonLinesReader<R> {
    type Item = Result<Vec<FieldValue>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
