//! Writing fixture record sets into database tables.
//!
//! A [`TableSynchronizer`] replaces the contents of a table with a
//! [`RecordSet`](fixture_core::RecordSet): one `DELETE`, one `INSERT` per
//! record, and a primary key sequence reset where the database has one.
//! Statements go through a [`Connection`], which also owns the quoting rules
//! of its SQL dialect ([`Quoter`]).
//!
//! Connections:
//!
//! - [`PostgresConnection`] (`tokio-postgres`)
//! - [`MySqlConnection`] (`mysql_async`)
//! - [`RecordingConnection`] keeps statements in memory instead of running them

pub mod connection;
pub mod mysql;
pub mod postgres;
pub mod quote;
pub mod recording;
pub mod sync;

pub use connection::Connection;
pub use mysql::MySqlConnection;
pub use postgres::PostgresConnection;
pub use quote::{AnsiQuoter, MySqlQuoter, PostgresQuoter, Quoter};
pub use recording::RecordingConnection;
pub use sync::{insert_statement, sync, SyncReport, TableSynchronizer};
