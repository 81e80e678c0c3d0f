//! Entity metadata and live-row lookup.

use async_trait::async_trait;
use fixture_core::naming::entity_for_table;
use fixture_core::{FixtureError, FixtureValue, Record, Result, Schema, TableSchema};
use fixture_sink::Connection;
use std::path::Path;

/// Answers questions about the entities fixtures belong to.
///
/// The session only needs column types (for quoting), the primary key name,
/// and a way to read a row back by key.
#[async_trait]
pub trait EntityResolver: Send + Sync {
    /// Column metadata for `entity`, if known.
    fn table_metadata(&self, entity: &str) -> Option<&TableSchema>;

    /// Whether rows of `entity` can be looked up at all.
    fn resolves(&self, _entity: &str) -> bool {
        true
    }

    /// Primary key column of `entity`.
    fn primary_key(&self, entity: &str) -> &str {
        self.table_metadata(entity)
            .map(|t| t.primary_key.as_str())
            .unwrap_or("id")
    }

    /// Read the row of `table` whose primary key equals `key`.
    async fn find_by_key(
        &self,
        conn: &mut (dyn Connection + '_),
        table: &str,
        entity: &str,
        key: &FixtureValue,
    ) -> Result<Option<Record>> {
        if !self.resolves(entity) {
            return Err(FixtureError::Resolution(format!(
                "unknown entity '{entity}' for table '{table}'"
            )));
        }

        let pk = self.primary_key(entity);
        let column = self.table_metadata(entity).and_then(|t| t.get_column(pk));
        let sql = format!(
            "SELECT * FROM {} WHERE {} = {}",
            conn.quote_identifier(table),
            conn.quote_identifier(pk),
            conn.quote_value(key, column)?
        );
        conn.fetch_one(&sql).await
    }
}

/// Resolver without metadata: every entity resolves, keys are `id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetadata;

impl EntityResolver for NoMetadata {
    fn table_metadata(&self, _entity: &str) -> Option<&TableSchema> {
        None
    }
}

/// Resolver backed by a YAML schema file.
///
/// An entity matches a table that names it explicitly (`entity: Site`) or,
/// failing that, a table whose default entity name is the entity
/// (`web_sites` for `WebSite`). Entities matching no table do not resolve.
#[derive(Debug, Clone, Default)]
pub struct SchemaResolver {
    schema: Schema,
}

impl SchemaResolver {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    /// Load the schema from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Schema::from_file(path)?))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl EntityResolver for SchemaResolver {
    fn table_metadata(&self, entity: &str) -> Option<&TableSchema> {
        self.schema.get_entity(entity).or_else(|| {
            self.schema
                .tables
                .iter()
                .find(|t| t.entity.is_none() && entity_for_table(&t.name) == entity)
        })
    }

    fn resolves(&self, entity: &str) -> bool {
        self.table_metadata(entity).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixture_sink::RecordingConnection;

    const SCHEMA: &str = r#"
tables:
  - name: web_sites
    columns:
      - name: id
        type: integer
  - name: people_table
    entity: Person
    primary_key: person_id
    columns:
      - name: person_id
        type: integer
"#;

    fn resolver() -> SchemaResolver {
        SchemaResolver::new(Schema::from_yaml(SCHEMA).unwrap())
    }

    #[test]
    fn test_schema_resolver_matches_entities() {
        let resolver = resolver();
        assert_eq!(resolver.table_metadata("WebSite").unwrap().name, "web_sites");
        assert_eq!(resolver.table_metadata("Person").unwrap().name, "people_table");
        assert!(resolver.table_metadata("Ghost").is_none());
        assert!(!resolver.resolves("Ghost"));
    }

    #[test]
    fn test_primary_key_defaults_to_id() {
        assert_eq!(NoMetadata.primary_key("Anything"), "id");
        assert_eq!(resolver().primary_key("Person"), "person_id");
    }

    #[tokio::test]
    async fn test_find_by_key_queries_by_primary_key() {
        let row: Record = [("person_id", "7")].into_iter().collect();
        let mut conn = RecordingConnection::new()
            .with_row("SELECT * FROM people_table WHERE person_id = 7", row.clone());

        let found = resolver()
            .find_by_key(&mut conn, "people_table", "Person", &"7".into())
            .await
            .unwrap();
        assert_eq!(found, Some(row));
    }

    #[tokio::test]
    async fn test_find_by_key_unknown_entity() {
        let mut conn = RecordingConnection::new();
        let err = resolver()
            .find_by_key(&mut conn, "ghosts", "Ghost", &FixtureValue::Integer(1))
            .await
            .unwrap_err();

        assert!(err.is_resolution());
        assert!(conn.statements().is_empty());
    }
}
