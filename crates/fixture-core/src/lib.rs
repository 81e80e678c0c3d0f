//! Core types for the fixture-sync framework.
//!
//! This crate provides the foundational types shared by the fixture loaders
//! and the table synchronizer:
//!
//! - [`FixtureValue`] - A single scalar (or nested JSON) attribute value
//! - [`Record`] - One named fixture, an ordered column -> value mapping
//! - [`RecordSet`] - All records loaded for one table, in source order
//! - [`Document`] - A parsed YAML fixture document before normalization
//! - [`Schema`] - Optional column metadata loaded from YAML
//! - [`FixtureError`] - The error type shared by every fixture crate
//!
//! # Architecture
//!
//! ```text
//! fixture-core (this crate)
//!    │
//!    ├─── fixture-source  (files -> RecordSet)
//!    │
//!    └─── fixture-sink    (RecordSet -> SQL statements)
//! ```
//!
//! # Example
//!
//! ```rust
//! use fixture_core::{FixtureValue, Record, RecordSet};
//!
//! let mut google = Record::new();
//! google.insert("id", FixtureValue::Integer(2));
//! google.insert("name", "Google");
//!
//! let mut sites = RecordSet::new();
//! sites.insert("google", google).unwrap();
//!
//! assert_eq!(sites.get("google").and_then(|r| r.get("id")), Some(&FixtureValue::Integer(2)));
//! ```

pub mod document;
pub mod error;
pub mod naming;
pub mod record;
pub mod schema;
pub mod value;

pub use document::Document;
pub use error::{FixtureError, Result, StatementError};
pub use record::{Record, RecordSet};
pub use schema::{ColumnInfo, ColumnType, Schema, SchemaError, TableSchema};
pub use value::FixtureValue;
