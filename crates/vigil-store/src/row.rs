//! Driver-normalised row values.
//!
//! Rows cross the adapter boundary as maps of column name to [`RowValue`], a
//! value enum mirroring SQLite's storage classes. Normalising here means the
//! differ's value-wise equality never has to care how the driver decoded a
//! column: integers are always `i64`, text is always `String`.

use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::ToSql;
use std::collections::HashMap;

/// A single column value after driver-native decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum RowValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// One row, keyed by column name. Equality is value-wise over the full key
/// set, in both directions: a dropped column registers as a change.
pub type RowMap = HashMap<String, RowValue>;

impl From<ValueRef<'_>> for RowValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => RowValue::Null,
            ValueRef::Integer(i) => RowValue::Integer(i),
            ValueRef::Real(f) => RowValue::Real(f),
            ValueRef::Text(t) => RowValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => RowValue::Blob(b.to_vec()),
        }
    }
}

impl ToSql for RowValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            RowValue::Null => ToSqlOutput::Owned(Value::Null),
            RowValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            RowValue::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
            RowValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            RowValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl From<i64> for RowValue {
    fn from(v: i64) -> Self {
        RowValue::Integer(v)
    }
}

impl From<&str> for RowValue {
    fn from(v: &str) -> Self {
        RowValue::Text(v.to_string())
    }
}

impl From<String> for RowValue {
    fn from(v: String) -> Self {
        RowValue::Text(v)
    }
}

/// Typed accessors over a [`RowMap`].
pub trait RowFields {
    /// The column as an integer, if present and of integer type.
    fn integer(&self, column: &str) -> Option<i64>;

    /// The column as text, if present and of text type.
    fn text(&self, column: &str) -> Option<&str>;
}

impl RowFields for RowMap {
    fn integer(&self, column: &str) -> Option<i64> {
        match self.get(column) {
            Some(RowValue::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    fn text(&self, column: &str) -> Option<&str> {
        match self.get(column) {
            Some(RowValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Decode the current row of `row` into a [`RowMap`] using the statement's
/// column names, captured before iteration.
pub(crate) fn decode_row(row: &rusqlite::Row<'_>, columns: &[String]) -> rusqlite::Result<RowMap> {
    let mut map = RowMap::with_capacity(columns.len());
    for (idx, name) in columns.iter().enumerate() {
        let value = row.get_ref(idx)?;
        map.insert(name.clone(), RowValue::from(value));
    }
    Ok(map)
}
