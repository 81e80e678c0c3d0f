//! Parsed YAML fixture documents.
//!
//! A YAML fixture file is either a plain mapping of record name to attributes,
//! or an ordered map (`--- !omap` or a bare sequence of single-entry mappings)
//! when the insert order matters. Both shapes are classified into a
//! [`Document`] and normalized into a [`RecordSet`] right away.

use crate::error::{FixtureError, Result};
use crate::record::{Record, RecordSet};
use crate::value::FixtureValue;
use serde_yaml::{Mapping, Value};
use std::path::Path;

/// A YAML fixture document, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    /// `!omap` or a sequence of mappings: records in declared order
    Ordered(Vec<(String, Value)>),

    /// A mapping of record name to record body
    Unordered(Mapping),
}

impl Document {
    /// Classify a parsed YAML value.
    ///
    /// Returns `None` for an empty (null) document.
    pub fn classify(value: Value, path: &Path) -> Result<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::Mapping(mapping) => Ok(Some(Self::Unordered(mapping))),
            Value::Sequence(items) => Self::ordered(items, path).map(Some),
            Value::Tagged(tagged) if is_omap_tag(&tagged.tag.to_string()) => match tagged.value {
                Value::Sequence(items) => Self::ordered(items, path).map(Some),
                Value::Null => Ok(None),
                _ => Err(FixtureError::format(path, "!omap must tag a sequence of mappings")),
            },
            Value::Tagged(tagged) => Err(FixtureError::format(
                path,
                format!("unsupported YAML tag {} on fixture document", tagged.tag),
            )),
            _ => Err(FixtureError::format(
                path,
                "expected a mapping of fixture names to attributes",
            )),
        }
    }

    fn ordered(items: Vec<Value>, path: &Path) -> Result<Self> {
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Mapping(mapping) => {
                    for (key, body) in mapping {
                        entries.push((record_name(&key, path)?, body));
                    }
                }
                other => {
                    return Err(FixtureError::format(
                        path,
                        format!("ordered fixtures must be single-entry mappings, found {other:?}"),
                    ))
                }
            }
        }
        Ok(Self::Ordered(entries))
    }

    /// Number of records declared in the document.
    pub fn len(&self) -> usize {
        match self {
            Self::Ordered(entries) => entries.len(),
            Self::Unordered(mapping) => mapping.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append this document's records to `set`.
    ///
    /// `entity` only appears in error messages.
    pub fn append_to(self, set: &mut RecordSet, entity: &str, path: &Path) -> Result<()> {
        let entries: Vec<(String, Value)> = match self {
            Self::Ordered(entries) => entries,
            Self::Unordered(mapping) => mapping
                .into_iter()
                .map(|(key, body)| Ok((record_name(&key, path)?, body)))
                .collect::<Result<_>>()?,
        };

        for (name, body) in entries {
            let record = match body {
                Value::Mapping(columns) => record_from_mapping(columns, path)?,
                Value::Null => {
                    return Err(FixtureError::format(
                        path,
                        format!("bad data for {entity} fixture named {name} (null)"),
                    ))
                }
                _ => {
                    return Err(FixtureError::format(
                        path,
                        format!("bad data for {entity} fixture named {name}: expected a mapping of columns"),
                    ))
                }
            };
            set.insert(name, record)
                .map_err(|dup| FixtureError::format(path, dup.to_string()))?;
        }
        Ok(())
    }

    /// Normalize into a fresh [`RecordSet`].
    pub fn into_record_set(self, entity: &str, path: &Path) -> Result<RecordSet> {
        let mut set = RecordSet::new();
        self.append_to(&mut set, entity, path)?;
        Ok(set)
    }
}

fn is_omap_tag(tag: &str) -> bool {
    tag.trim_start_matches('!') == "omap" || tag.ends_with(":omap")
}

fn record_name(key: &Value, path: &Path) -> Result<String> {
    scalar_key(key).ok_or_else(|| {
        FixtureError::format(path, format!("fixture names must be scalars, found {key:?}"))
    })
}

fn scalar_key(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn record_from_mapping(columns: Mapping, path: &Path) -> Result<Record> {
    let mut record = Record::new();
    for (key, value) in columns {
        let column = scalar_key(&key).ok_or_else(|| {
            FixtureError::format(path, format!("column names must be scalars, found {key:?}"))
        })?;
        record.insert(column, FixtureValue::from_yaml(value));
    }
    Ok(record)
}
