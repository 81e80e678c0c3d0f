//! Fixture sessions: batch loading, named access and instantiation.
//!
//! A [`FixtureSession`] is the explicit context a test suite keeps around. It
//! remembers which record sets were loaded for which table, and which live
//! rows were read back for which fixture, until it is dropped.

use crate::resolver::{EntityResolver, NoMetadata};
use fixture_core::naming::entity_for_table;
use fixture_core::{FixtureError, Record, RecordSet, Result};
use fixture_sink::{Connection, TableSynchronizer};
use fixture_source::{LoaderConfig, RecordSetLoader};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// The record set loaded for one table.
#[derive(Debug, Clone)]
pub struct Fixtures {
    table: String,
    entity: String,
    dataset: PathBuf,
    records: RecordSet,
}

impl Fixtures {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Path stem the records were loaded from.
    pub fn dataset(&self) -> &Path {
        &self.dataset
    }

    pub fn records(&self) -> &RecordSet {
        &self.records
    }

    /// Get a fixture by name, failing if there is none.
    pub fn record(&self, name: &str) -> Result<&Record> {
        self.records.get(name).ok_or_else(|| {
            FixtureError::Resolution(format!(
                "No fixture with name '{name}' found for table '{}'",
                self.table
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Loads fixture batches into a database and keeps track of them.
pub struct FixtureSession {
    fixtures_path: PathBuf,
    loader: RecordSetLoader,
    class_names: HashMap<String, String>,
    resolver: Box<dyn EntityResolver>,
    loaded: BTreeMap<String, Fixtures>,
    instances: HashMap<(String, String), Option<Record>>,
}

impl FixtureSession {
    /// Create a session reading fixtures from `fixtures_path`.
    pub fn new(fixtures_path: impl Into<PathBuf>) -> Self {
        Self {
            fixtures_path: fixtures_path.into(),
            loader: RecordSetLoader::default(),
            class_names: HashMap::new(),
            resolver: Box::new(NoMetadata),
            loaded: BTreeMap::new(),
            instances: HashMap::new(),
        }
    }

    /// Map tables to entity names that differ from the default.
    pub fn with_class_names<K, V>(mut self, class_names: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.class_names
            .extend(class_names.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_resolver(mut self, resolver: impl EntityResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn with_loader_config(mut self, config: LoaderConfig) -> Self {
        self.loader = RecordSetLoader::new(config);
        self
    }

    pub fn fixtures_path(&self) -> &Path {
        &self.fixtures_path
    }

    /// Entity name for `table`: an explicit mapping, else `web_sites` -> `WebSite`.
    pub fn entity_for(&self, table: &str) -> String {
        self.class_names
            .get(table)
            .cloned()
            .unwrap_or_else(|| entity_for_table(table))
    }

    /// Load `tables` and replace their contents in the database.
    ///
    /// A name may carry directories (`admin/users`); the table is its last
    /// segment. All tables are deleted from in reverse order, then filled in
    /// the given order, then their key sequences are reset. The batch runs
    /// in a transaction unless the caller already has one open; on failure a
    /// transaction opened here is rolled back.
    pub async fn create_fixtures<C, S>(&mut self, conn: &mut C, tables: &[S]) -> Result<Vec<&Fixtures>>
    where
        C: Connection + ?Sized,
        S: AsRef<str>,
    {
        let mut batch = Vec::with_capacity(tables.len());
        for name in tables {
            let name = name.as_ref();
            let table = table_name(name).to_string();
            let entity = self.entity_for(&table);
            let dataset = self.fixtures_path.join(name);
            let records = self.loader.load(&dataset, &entity).await?;
            batch.push(Fixtures {
                table,
                entity,
                dataset,
                records,
            });
        }

        let opened = !conn.in_transaction();
        if opened {
            conn.begin().await?;
        }

        match self.write_batch(conn, &batch).await {
            Ok(()) => {
                if opened {
                    conn.commit().await?;
                }
            }
            Err(e) => {
                if opened {
                    if let Err(rollback_error) = conn.rollback().await {
                        warn!("Rollback after failed fixture load also failed: {rollback_error}");
                    }
                }
                return Err(e);
            }
        }

        let names: Vec<String> = batch.iter().map(|f| f.table.clone()).collect();
        for fixtures in batch {
            self.instances.retain(|(table, _), _| *table != fixtures.table);
            info!(
                "Loaded {} fixtures into {}",
                fixtures.records.len(),
                fixtures.table
            );
            self.loaded.insert(fixtures.table.clone(), fixtures);
        }

        Ok(names.iter().filter_map(|t| self.loaded.get(t)).collect())
    }

    async fn write_batch<C>(&self, conn: &mut C, batch: &[Fixtures]) -> Result<()>
    where
        C: Connection + ?Sized,
    {
        let mut sync = TableSynchronizer::new(conn);

        for fixtures in batch.iter().rev() {
            sync.delete_existing(&fixtures.table).await?;
        }
        for fixtures in batch {
            let columns = self.resolver.table_metadata(&fixtures.entity);
            sync.insert_all(&fixtures.records, &fixtures.table, columns)
                .await?;
        }
        for fixtures in batch {
            if sync.reset_pk_sequence(&fixtures.table).await? {
                debug!("Reset primary key sequence for {}", fixtures.table);
            }
        }
        Ok(())
    }

    /// Fixtures loaded for `table`, if any.
    pub fn fixtures(&self, table: &str) -> Option<&Fixtures> {
        self.loaded.get(table)
    }

    /// Every loaded table, by table name.
    pub fn all_fixtures(&self) -> impl Iterator<Item = &Fixtures> {
        self.loaded.values()
    }

    /// The fixture named `name` in `table`.
    pub fn record(&self, table: &str, name: &str) -> Result<&Record> {
        self.loaded
            .get(table)
            .ok_or_else(|| FixtureError::Resolution(format!("No fixtures loaded for table '{table}'")))?
            .record(name)
    }

    /// Read back the live row for fixture `name` of `table`.
    ///
    /// The result is cached until [`FixtureSession::reload`] or until the
    /// table is loaded again.
    pub async fn instantiate<C>(
        &mut self,
        conn: &mut C,
        table: &str,
        name: &str,
    ) -> Result<Option<Record>>
    where
        C: Connection,
    {
        let cache_key = (table.to_string(), name.to_string());
        if let Some(row) = self.instances.get(&cache_key) {
            return Ok(row.clone());
        }

        let entity = self.fixtures_entity(table)?;
        let pk = self.resolver.primary_key(&entity).to_string();
        let key = self.record(table, name)?.get(&pk).cloned().ok_or_else(|| {
            FixtureError::Resolution(format!(
                "fixture '{name}' of table '{table}' has no '{pk}' value"
            ))
        })?;

        let row = self
            .resolver
            .find_by_key(conn, table, &entity, &key)
            .await?;
        self.instances.insert(cache_key, row.clone());
        Ok(row)
    }

    /// Instantiate every loaded fixture, skipping those whose entity cannot
    /// be resolved. Returns the number of fixtures read back.
    pub async fn instantiate_all<C>(&mut self, conn: &mut C) -> Result<usize>
    where
        C: Connection,
    {
        let targets: Vec<(String, String)> = self
            .loaded
            .values()
            .flat_map(|f| {
                f.records
                    .names()
                    .map(move |name| (f.table.clone(), name.to_string()))
            })
            .collect();

        let mut count = 0;
        for (table, name) in targets {
            match self.instantiate(conn, &table, &name).await {
                Ok(_) => count += 1,
                Err(e) if e.is_resolution() => {
                    warn!("Skipping instantiation of {table}.{name}: {e}");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(count)
    }

    /// A previously instantiated row.
    pub fn instance(&self, table: &str, name: &str) -> Option<&Record> {
        self.instances
            .get(&(table.to_string(), name.to_string()))
            .and_then(Option::as_ref)
    }

    /// Forget instantiated rows so the next lookup reads the database again.
    pub fn reload(&mut self) {
        self.instances.clear();
    }

    fn fixtures_entity(&self, table: &str) -> Result<String> {
        self.loaded
            .get(table)
            .map(|f| f.entity.clone())
            .ok_or_else(|| FixtureError::Resolution(format!("No fixtures loaded for table '{table}'")))
    }
}

/// `admin/users` -> `users`.
fn table_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}
