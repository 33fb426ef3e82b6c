//! Raw values as read from the source.

/// One column value exactly as SQLite stored it.
///
/// Text is kept as bytes: SQLite does not enforce UTF-8, and a migration of
/// legacy data must not fail while reading.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(Vec<u8>),
    Blob(Vec<u8>),
}

impl RawValue {
    /// Text value from a Rust string.
    pub fn text(s: impl Into<String>) -> Self {
        RawValue::Text(s.into().into_bytes())
    }
}

impl From<rusqlite::types::ValueRef<'_>> for RawValue {
    fn from(value: rusqlite::types::ValueRef<'_>) -> Self {
        use rusqlite::types::ValueRef;
        match value {
            ValueRef::Null => RawValue::Null,
            ValueRef::Integer(i) => RawValue::Integer(i),
            ValueRef::Real(f) => RawValue::Real(f),
            ValueRef::Text(t) => RawValue::Text(t.to_vec()),
            ValueRef::Blob(b) => RawValue::Blob(b.to_vec()),
        }
    }
}

/// A source row, in source column order.
pub type RawRow = Vec<RawValue>;
