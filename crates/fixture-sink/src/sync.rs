//! Table synchronization: replace a table's rows with a record set.

use crate::connection::Connection;
use fixture_core::{FixtureError, Record, RecordSet, Result, TableSchema};
use tracing::{debug, info};

/// Outcome of synchronizing one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Table that was synchronized
    pub table: String,

    /// Rows removed by the delete phase, as reported by the connection
    pub deleted: u64,

    /// Records inserted
    pub inserted: usize,

    /// Whether the primary key sequence was reset
    pub sequence_reset: bool,
}

/// Writes record sets into tables through one connection.
///
/// Each phase is available on its own so a batch over several tables can
/// delete from all of them (in reverse order) before inserting into any.
pub struct TableSynchronizer<'c, C: ?Sized> {
    connection: &'c mut C,
}

impl<'c, C: Connection + ?Sized> TableSynchronizer<'c, C> {
    pub fn new(connection: &'c mut C) -> Self {
        Self { connection }
    }

    /// Delete every row of `table`, insert every record of `set`, then reset
    /// the primary key sequence when the connection supports it.
    pub async fn sync(
        &mut self,
        set: &RecordSet,
        table: &str,
        columns: Option<&TableSchema>,
    ) -> Result<SyncReport> {
        let deleted = self.delete_existing(table).await?;
        let inserted = self.insert_all(set, table, columns).await?;
        let sequence_reset = self.reset_pk_sequence(table).await?;

        info!("Synchronized {inserted} rows into {table}");
        Ok(SyncReport {
            table: table.to_string(),
            deleted,
            inserted,
            sequence_reset,
        })
    }

    /// `DELETE FROM <table>`.
    pub async fn delete_existing(&mut self, table: &str) -> Result<u64> {
        let sql = format!("DELETE FROM {}", self.connection.quote_identifier(table));
        debug!("{sql}");
        self.connection.delete(&sql).await
    }

    /// One `INSERT` per record, in record set order.
    pub async fn insert_all(
        &mut self,
        set: &RecordSet,
        table: &str,
        columns: Option<&TableSchema>,
    ) -> Result<usize> {
        for (name, record) in set.iter() {
            let sql = insert_statement(&*self.connection, table, record, columns)
                .map_err(|e| match e {
                    FixtureError::Value { column, message } => FixtureError::Value {
                        column: format!("{table}.{column}"),
                        message: format!("{message} (fixture '{name}')"),
                    },
                    other => other,
                })?;
            debug!("{sql}");
            self.connection.execute(&sql).await?;
        }
        Ok(set.len())
    }

    /// Reset the primary key sequence of `table` if the connection can.
    pub async fn reset_pk_sequence(&mut self, table: &str) -> Result<bool> {
        if !self.connection.supports_pk_sequence_reset() {
            return Ok(false);
        }
        self.connection.reset_pk_sequence(table).await?;
        Ok(true)
    }
}

/// Replace the contents of `table` with `set`.
pub async fn sync<C: Connection + ?Sized>(
    set: &RecordSet,
    table: &str,
    connection: &mut C,
    columns: Option<&TableSchema>,
) -> Result<SyncReport> {
    TableSynchronizer::new(connection)
        .sync(set, table, columns)
        .await
}

/// Render the `INSERT` for one record.
///
/// Columns appear in the record's own order; a record without attributes
/// inserts a row of column defaults.
pub fn insert_statement<C: Connection + ?Sized>(
    connection: &C,
    table: &str,
    record: &Record,
    columns: Option<&TableSchema>,
) -> Result<String> {
    let table = connection.quote_identifier(table);
    if record.is_empty() {
        return Ok(connection.quoter().insert_defaults(&table));
    }

    let mut names = Vec::with_capacity(record.len());
    let mut values = Vec::with_capacity(record.len());
    for (column, value) in record.iter() {
        let info = columns.and_then(|schema| schema.get_column(column));
        names.push(connection.quote_identifier(column));
        values.push(connection.quote_value(value, info)?);
    }

    Ok(format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        names.join(", "),
        values.join(", ")
    ))
}
