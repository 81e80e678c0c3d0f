//! An in-memory connection that records statements instead of running them.
//!
//! Used by the test suites and by `fixture-sync load --dry-run`.

use crate::connection::Connection;
use crate::quote::{AnsiQuoter, Quoter};
use async_trait::async_trait;
use fixture_core::{FixtureError, Record, Result};
use std::collections::HashMap;
use tracing::debug;

/// Connection double that logs every statement it receives.
///
/// Queries answer from rows registered with [`RecordingConnection::with_row`];
/// statements containing a fragment registered with
/// [`RecordingConnection::fail_on`] fail.
#[derive(Debug, Default)]
pub struct RecordingConnection<Q = AnsiQuoter> {
    quoter: Q,
    statements: Vec<String>,
    rows: HashMap<String, Record>,
    failures: Vec<String>,
    in_transaction: bool,
    pk_sequence_reset: bool,
}

impl RecordingConnection {
    /// Create a recording connection using ANSI quoting.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<Q: Quoter> RecordingConnection<Q> {
    /// Create a recording connection for the dialect `quoter` belongs to.
    pub fn with_quoter(quoter: Q) -> Self {
        Self {
            quoter,
            statements: Vec::new(),
            rows: HashMap::new(),
            failures: Vec::new(),
            in_transaction: false,
            pk_sequence_reset: false,
        }
    }

    /// Answer `sql` with `row`.
    pub fn with_row(mut self, sql: impl Into<String>, row: Record) -> Self {
        self.rows.insert(sql.into(), row);
        self
    }

    /// Fail every statement that contains `fragment`.
    pub fn fail_on(mut self, fragment: impl Into<String>) -> Self {
        self.failures.push(fragment.into());
        self
    }

    /// Advertise (and log) primary key sequence resets.
    pub fn with_pk_sequence_reset(mut self, enabled: bool) -> Self {
        self.pk_sequence_reset = enabled;
        self
    }

    /// Every statement received so far, in order.
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Drain the statement log.
    pub fn take_statements(&mut self) -> Vec<String> {
        std::mem::take(&mut self.statements)
    }

    fn record(&mut self, sql: &str) -> Result<()> {
        debug!("Recorded statement: {sql}");
        self.statements.push(sql.to_string());
        if self.failures.iter().any(|f| sql.contains(f.as_str())) {
            return Err(FixtureError::statement(sql, "simulated failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl<Q: Quoter> Connection for RecordingConnection<Q> {
    async fn execute(&mut self, sql: &str) -> Result<u64> {
        self.record(sql)?;
        Ok(u64::from(sql.trim_start().starts_with("INSERT")))
    }

    async fn delete(&mut self, sql: &str) -> Result<u64> {
        self.record(sql)?;
        Ok(0)
    }

    async fn fetch_one(&mut self, sql: &str) -> Result<Option<Record>> {
        self.record(sql)?;
        Ok(self.rows.get(sql).cloned())
    }

    async fn begin(&mut self) -> Result<()> {
        if self.in_transaction {
            return Err(FixtureError::statement("BEGIN", "a transaction is already open"));
        }
        self.record("BEGIN")?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.record("COMMIT")?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.in_transaction = false;
        self.record("ROLLBACK")
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn supports_pk_sequence_reset(&self) -> bool {
        self.pk_sequence_reset
    }

    async fn reset_pk_sequence(&mut self, table: &str) -> Result<()> {
        let sql = format!("-- reset primary key sequence for {table}");
        self.record(&sql)
    }

    fn quoter(&self) -> &dyn Quoter {
        &self.quoter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quote::MySqlQuoter;

    #[tokio::test]
    async fn test_records_statements_in_order() {
        let mut conn = RecordingConnection::new();
        conn.begin().await.unwrap();
        conn.delete("DELETE FROM sites").await.unwrap();
        assert_eq!(conn.execute("INSERT INTO sites (id) VALUES (1)").await.unwrap(), 1);
        conn.commit().await.unwrap();

        assert_eq!(
            conn.statements(),
            ["BEGIN", "DELETE FROM sites", "INSERT INTO sites (id) VALUES (1)", "COMMIT"]
        );
        assert!(!conn.in_transaction());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let mut conn = RecordingConnection::new().fail_on("INSERT INTO topics");
        assert!(conn.execute("INSERT INTO sites (id) VALUES (1)").await.is_ok());

        let err = conn
            .execute("INSERT INTO topics (id) VALUES (1)")
            .await
            .unwrap_err();
        assert!(matches!(err, FixtureError::Statement { .. }));
    }

    #[tokio::test]
    async fn test_fetch_one_answers_registered_rows() {
        let row: Record = [("id", 1)].into_iter().collect();
        let mut conn =
            RecordingConnection::new().with_row("SELECT * FROM sites WHERE id = 1", row.clone());

        assert_eq!(
            conn.fetch_one("SELECT * FROM sites WHERE id = 1").await.unwrap(),
            Some(row)
        );
        assert_eq!(conn.fetch_one("SELECT * FROM sites WHERE id = 2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_nested_begin_is_rejected() {
        let mut conn = RecordingConnection::new();
        conn.begin().await.unwrap();
        assert!(conn.begin().await.is_err());
    }

    #[test]
    fn test_dialect_quoting() {
        let conn = RecordingConnection::with_quoter(MySqlQuoter);
        assert_eq!(conn.quote_identifier("sites"), "`sites`");
    }
}
