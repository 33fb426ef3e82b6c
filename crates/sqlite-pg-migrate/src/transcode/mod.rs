//! Conversion of raw SQLite rows into PostgreSQL literal fragments.
//!
//! Each value becomes a fragment that can be spliced into an `INSERT ...
//! VALUES (...)` list as-is: `NULL`, a bare number, `true`/`false`, a quoted
//! string, or a quoted string with a `::json`/`::jsonb` cast.

use crate::core::{ColumnDescriptor, RawValue, TableDescriptor, TranscodeWarning};
use crate::error::{MigrateError, Result};
use std::borrow::Cow;

/// Literal used when a JSON column holds text that does not parse.
const EMPTY_JSON_OBJECT: &str = "'{}'";

/// A row ready for statement assembly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscodedRow {
    /// One literal per column, in descriptor column order.
    pub literals: Vec<String>,

    /// Values that were replaced.
    pub warnings: Vec<TranscodeWarning>,
}

/// Decode bytes as UTF-8, replacing invalid sequences.
pub fn decode_bytes(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Escape text for a single-quoted literal: `'` is doubled, NUL is dropped.
pub fn escape_literal(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    for ch in text.chars() {
        match ch {
            '\'' => escaped.push_str("''"),
            '\0' => {}
            c => escaped.push(c),
        }
    }
    escaped
}

fn quoted(text: &str) -> String {
    format!("'{}'", escape_literal(text))
}

fn json_cast(target_type: &str) -> &'static str {
    if target_type.eq_ignore_ascii_case("json") {
        "::json"
    } else {
        "::jsonb"
    }
}

fn real_literal(value: f64) -> String {
    if value.is_nan() {
        "'NaN'".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            "'Infinity'".to_string()
        } else {
            "'-Infinity'".to_string()
        }
    } else {
        value.to_string()
    }
}

/// Converts rows of one table.
#[derive(Debug, Clone, Copy, Default)]
pub struct Transcoder;

impl Transcoder {
    pub fn new() -> Self {
        Self
    }

    /// Convert a raw row. Fails only when the row does not have one value
    /// per descriptor column.
    pub fn transcode(
        &self,
        row: &[RawValue],
        table: &TableDescriptor,
        row_index: u64,
    ) -> Result<TranscodedRow> {
        if row.len() != table.columns.len() {
            return Err(MigrateError::Transcode {
                column: format!("{}.*", table.name),
                message: format!(
                    "row {} has {} values, table has {} columns",
                    row_index,
                    row.len(),
                    table.columns.len()
                ),
            });
        }

        let mut out = TranscodedRow {
            literals: Vec::with_capacity(row.len()),
            warnings: Vec::new(),
        };

        for (value, column) in row.iter().zip(&table.columns) {
            let literal = match self.transcode_value(value, column) {
                Ok(literal) => literal,
                Err(message) => {
                    out.warnings.push(TranscodeWarning {
                        table: table.name.clone(),
                        row_index,
                        column: column.name.clone(),
                        message,
                    });
                    format!("{}{}", EMPTY_JSON_OBJECT, json_cast(&column.target_type))
                }
            };
            out.literals.push(literal);
        }

        Ok(out)
    }

    /// `Err` carries the reason a JSON value was replaced.
    fn transcode_value(
        &self,
        value: &RawValue,
        column: &ColumnDescriptor,
    ) -> std::result::Result<String, String> {
        let text: Option<Cow<'_, str>> = match value {
            RawValue::Null => return Ok("NULL".to_string()),
            RawValue::Blob(bytes) | RawValue::Text(bytes) => {
                Some(String::from_utf8_lossy(bytes))
            }
            _ => None,
        };

        if column.is_boolean() {
            let truth = matches!(value, RawValue::Integer(1));
            return Ok(truth.to_string());
        }

        match (text, value) {
            (Some(text), _) if column.is_json => {
                serde_json::from_str::<serde_json::Value>(&text)
                    .map(|_| format!("{}{}", quoted(&text), json_cast(&column.target_type)))
                    .map_err(|e| format!("invalid JSON replaced with {{}}: {}", e))
            }
            (Some(text), _) => Ok(quoted(&text)),
            (None, RawValue::Integer(i)) => Ok(i.to_string()),
            (None, RawValue::Real(r)) => Ok(real_literal(*r)),
            (None, _) => Ok("NULL".to_string()),
        }
    }
}
