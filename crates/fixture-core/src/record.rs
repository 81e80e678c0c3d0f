//! Records and record sets.
//!
//! Both types keep their entries in insertion order: column order decides the
//! column list of the generated `INSERT`, and record order decides the order
//! rows are inserted in (tree-shaped data with self references depends on it).

use crate::value::FixtureValue;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

/// One named fixture: an ordered mapping of column name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, FixtureValue)>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column value, returning the previous value if the column existed.
    ///
    /// An existing column keeps its position.
    pub fn insert(
        &mut self,
        column: impl Into<String>,
        value: impl Into<FixtureValue>,
    ) -> Option<FixtureValue> {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.fields.push((column, value));
                None
            }
        }
    }

    /// Get a column value by name.
    pub fn get(&self, column: &str) -> Option<&FixtureValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Check if the record has a column.
    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Column/value pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FixtureValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<FixtureValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (column, value) in iter {
            record.insert(column, value);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Returned when a record name is inserted twice into a [`RecordSet`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("duplicate record named '{0}'")]
pub struct DuplicateRecord(pub String);

/// All records loaded for one table, keyed by record name, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    records: Vec<(String, Record)>,

    /// Cached name lookup
    index: HashMap<String, usize>,
}

impl RecordSet {
    /// Create an empty record set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Names are unique within a set.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        record: Record,
    ) -> Result<(), DuplicateRecord> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(DuplicateRecord(name));
        }
        self.index.insert(name.clone(), self.records.len());
        self.records.push((name, record));
        Ok(())
    }

    /// Get a record by name.
    pub fn get(&self, name: &str) -> Option<&Record> {
        self.index
            .get(name)
            .and_then(|&idx| self.records.get(idx))
            .map(|(_, record)| record)
    }

    /// Record names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|(name, _)| name.as_str())
    }

    /// Name/record pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Record)> {
        self.records.iter().map(|(name, record)| (name.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = (&'a str, &'a Record);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a Record)> + Send + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl Serialize for RecordSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.records.len()))?;
        for (name, record) in &self.records {
            map.serialize_entry(name, record)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keeps_column_order() {
        let mut record: Record = [("name", "Google"), ("url", "http://www.google.com")]
            .into_iter()
            .collect();
        record.insert("id", 2);

        assert_eq!(record.columns().collect::<Vec<_>>(), vec!["name", "url", "id"]);
    }

    #[test]
    fn test_record_insert_replaces_in_place() {
        let mut record = Record::new();
        record.insert("a", 1);
        record.insert("b", 2);
        let old = record.insert("a", 3);

        assert_eq!(old, Some(FixtureValue::Integer(1)));
        assert_eq!(record.columns().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(record.get("a"), Some(&FixtureValue::Integer(3)));
    }

    #[test]
    fn test_record_set_rejects_duplicates() {
        let mut set = RecordSet::new();
        set.insert("parent", Record::new()).unwrap();
        set.insert("child", Record::new()).unwrap();

        assert_eq!(
            set.insert("parent", Record::new()),
            Err(DuplicateRecord("parent".to_string()))
        );
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["parent", "child"]);
    }

    #[test]
    fn test_record_set_serializes_in_order() {
        let mut set = RecordSet::new();
        set.insert("z", [("id", 1)].into_iter().collect()).unwrap();
        set.insert("a", [("id", 2)].into_iter().collect()).unwrap();

        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"{"z":{"id":1},"a":{"id":2}}"#);
    }
}
