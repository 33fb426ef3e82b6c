//! Core types shared by the source, target and migration stages.
//!
//! - [`identifier`]: quoting rules for both dialects
//! - [`schema`]: table and column descriptors
//! - [`value`]: raw source values
//! - [`report`]: per-table outcome records

pub mod identifier;
pub mod report;
pub mod schema;
pub mod value;

pub use identifier::{quote_sqlite, validate_identifier, IdentifierPolicy};
pub use report::{FailedRow, MigrationReport, TranscodeWarning};
pub use schema::{ColumnDescriptor, SourceColumn, TableDescriptor};
pub use value::{RawRow, RawValue};
