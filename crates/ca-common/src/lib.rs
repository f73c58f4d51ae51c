//! CSV Append common types and errors.
//!
//! This crate provides foundational types shared across the workspace:
//! - Host field schema types (declared field types, ordered schemas)
//! - Common error type with stable error codes

pub mod error;
pub mod field;

pub use error::{Error, Result};
pub use field::{FieldDef, FieldSchema, FieldType};
