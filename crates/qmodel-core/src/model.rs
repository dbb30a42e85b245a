//! The `Model` trait: declarative schema for statically known tables.
//!
//! A model ties a table name to an ordered field list; declaration order is
//! the column order in DDL and in insert serialization. The `qmodel::model!`
//! macro generates implementations; they can also be written by hand.

use std::sync::Arc;

use crate::dynamic::SchemaDescriptor;
use crate::error::{Error, Result};
use crate::field::FieldInfo;
use crate::registry;
use crate::row::RowView;
use crate::types::QKind;
use crate::value::Value;

/// A statically declared table schema.
pub trait Model: Sized {
    /// Table name in the server process.
    const TABLE_NAME: &'static str;

    /// Ordered field metadata; declaration order is column order.
    fn fields() -> &'static [FieldInfo];

    /// Names of the primary-key fields, in key order.
    fn key_fields() -> &'static [&'static str] {
        &[]
    }

    /// Values for one row, in declared field order.
    fn to_row(&self) -> Vec<Value>;

    /// Construct an instance from a result row.
    fn from_row(row: &RowView<'_>) -> Result<Self>;

    /// Runtime descriptor equivalent to this model.
    fn descriptor() -> SchemaDescriptor {
        SchemaDescriptor::from_static(Self::TABLE_NAME, Self::fields(), Self::key_fields())
    }

    /// Register the descriptor in the process-global registry and return
    /// the shared handle.
    fn register() -> Arc<SchemaDescriptor> {
        registry::register(Self::descriptor())
    }
}

// ==================== Row extraction helpers ====================
//
// Used by generated `from_row` impls; each helper names the column in its
// error so failures read as one line of context.

fn fetch(row: &RowView<'_>, column: &str) -> Result<Value> {
    row.get(column)
        .ok_or_else(|| Error::model(format!("result row missing column '{column}'")))
}

fn type_mismatch(column: &str, expected: &str, got: &Value) -> Error {
    Error::model(format!(
        "column '{column}': expected {expected}, got {got:?}"
    ))
}

pub fn get_bool(row: &RowView<'_>, column: &str) -> Result<bool> {
    match fetch(row, column)? {
        Value::Bool(v) => Ok(v),
        other => Err(type_mismatch(column, "boolean", &other)),
    }
}

pub fn get_guid(row: &RowView<'_>, column: &str) -> Result<[u8; 16]> {
    match fetch(row, column)? {
        Value::Guid(v) => Ok(v),
        Value::Null(QKind::Guid) => Ok(crate::types::NULL_GUID),
        other => Err(type_mismatch(column, "guid", &other)),
    }
}

pub fn get_byte(row: &RowView<'_>, column: &str) -> Result<u8> {
    match fetch(row, column)? {
        Value::Byte(v) => Ok(v),
        other => Err(type_mismatch(column, "byte", &other)),
    }
}

pub fn get_short(row: &RowView<'_>, column: &str) -> Result<i16> {
    match fetch(row, column)? {
        Value::Short(v) => Ok(v),
        Value::Null(QKind::Short) => Ok(crate::types::NULL_SHORT),
        other => Err(type_mismatch(column, "short", &other)),
    }
}

pub fn get_int(row: &RowView<'_>, column: &str) -> Result<i32> {
    match fetch(row, column)? {
        Value::Int(v) => Ok(v),
        Value::Null(QKind::Int) => Ok(crate::types::NULL_INT),
        other => Err(type_mismatch(column, "int", &other)),
    }
}

pub fn get_long(row: &RowView<'_>, column: &str) -> Result<i64> {
    match fetch(row, column)? {
        Value::Long(v) => Ok(v),
        Value::Null(QKind::Long) => Ok(crate::types::NULL_LONG),
        other => Err(type_mismatch(column, "long", &other)),
    }
}

pub fn get_real(row: &RowView<'_>, column: &str) -> Result<f32> {
    match fetch(row, column)? {
        Value::Real(v) => Ok(v),
        Value::Null(QKind::Real) => Ok(f32::NAN),
        other => Err(type_mismatch(column, "real", &other)),
    }
}

pub fn get_float(row: &RowView<'_>, column: &str) -> Result<f64> {
    match fetch(row, column)? {
        Value::Float(v) => Ok(v),
        Value::Null(QKind::Float) => Ok(f64::NAN),
        other => Err(type_mismatch(column, "float", &other)),
    }
}

pub fn get_char(row: &RowView<'_>, column: &str) -> Result<u8> {
    match fetch(row, column)? {
        Value::Char(v) => Ok(v),
        Value::Null(QKind::Char) => Ok(crate::types::NULL_CHAR),
        other => Err(type_mismatch(column, "char", &other)),
    }
}

pub fn get_symbol(row: &RowView<'_>, column: &str) -> Result<String> {
    match fetch(row, column)? {
        Value::Symbol(v) => Ok(v),
        Value::Null(QKind::Symbol) => Ok(String::new()),
        other => Err(type_mismatch(column, "symbol", &other)),
    }
}

/// Shared extractor for the i64-backed temporal kinds.
pub fn get_temporal_i64(row: &RowView<'_>, column: &str, kind: QKind) -> Result<i64> {
    match fetch(row, column)? {
        Value::Timestamp(v) if kind == QKind::Timestamp => Ok(v),
        Value::Timespan(v) if kind == QKind::Timespan => Ok(v),
        Value::Null(k) if k == kind => Ok(crate::types::NULL_LONG),
        other => Err(type_mismatch(column, kind.name(), &other)),
    }
}

/// Shared extractor for the i32-backed temporal kinds.
pub fn get_temporal_i32(row: &RowView<'_>, column: &str, kind: QKind) -> Result<i32> {
    match fetch(row, column)? {
        Value::Month(v) if kind == QKind::Month => Ok(v),
        Value::Date(v) if kind == QKind::Date => Ok(v),
        Value::Minute(v) if kind == QKind::Minute => Ok(v),
        Value::Second(v) if kind == QKind::Second => Ok(v),
        Value::Time(v) if kind == QKind::Time => Ok(v),
        Value::Null(k) if k == kind => Ok(crate::types::NULL_INT),
        other => Err(type_mismatch(column, kind.name(), &other)),
    }
}

pub fn get_datetime(row: &RowView<'_>, column: &str) -> Result<f64> {
    match fetch(row, column)? {
        Value::Datetime(v) => Ok(v),
        Value::Null(QKind::Datetime) => Ok(f64::NAN),
        other => Err(type_mismatch(column, "datetime", &other)),
    }
}
