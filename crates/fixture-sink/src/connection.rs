//! The database connection abstraction the synchronizer writes through.

use crate::quote::Quoter;
use async_trait::async_trait;
use fixture_core::{ColumnInfo, FixtureValue, Record, Result};

/// A single database connection.
///
/// Methods take `&mut self`: one batch owns the connection until it is done,
/// and every statement runs to completion before the next one is issued.
#[async_trait]
pub trait Connection: Send {
    /// Execute a statement, returning the number of affected rows.
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Execute a `DELETE`, returning the number of deleted rows.
    async fn delete(&mut self, sql: &str) -> Result<u64> {
        self.execute(sql).await
    }

    /// Run a query and return its first row, if any.
    async fn fetch_one(&mut self, sql: &str) -> Result<Option<Record>>;

    async fn begin(&mut self) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    /// Whether a transaction opened through [`Connection::begin`] is active.
    fn in_transaction(&self) -> bool;

    /// Whether [`Connection::reset_pk_sequence`] does anything.
    fn supports_pk_sequence_reset(&self) -> bool {
        false
    }

    /// Move the table's primary key sequence past the largest key in use.
    async fn reset_pk_sequence(&mut self, _table: &str) -> Result<()> {
        Ok(())
    }

    /// Quoting rules for this connection's dialect.
    fn quoter(&self) -> &dyn Quoter;

    fn quote_identifier(&self, name: &str) -> String {
        self.quoter().quote_identifier(name)
    }

    fn quote_value(&self, value: &FixtureValue, column: Option<&ColumnInfo>) -> Result<String> {
        self.quoter().quote_value(value, column)
    }
}
