//! YAML fixture parsing.

use fixture_core::{Document, FixtureError, RecordSet, Result};
use serde::Deserialize;
use std::path::Path;

/// Parse (already template-expanded) YAML fixture text into a record set.
///
/// Every document in the stream contributes its records in order, so
/// sub-fixture files concatenated ahead of the primary file may each carry
/// their own `---` header.
pub fn parse(text: &str, entity: &str, path: &Path) -> Result<RecordSet> {
    let mut set = RecordSet::new();

    for document in serde_yaml::Deserializer::from_str(text) {
        let value = serde_yaml::Value::deserialize(document).map_err(|e| {
            FixtureError::format(
                path,
                format!(
                    "a YAML error occurred parsing {}. Please note that YAML must be consistently \
                     indented using spaces. Tabs are not allowed.\nThe exact error was:\n  {e}",
                    path.display()
                ),
            )
        })?;

        if let Some(document) = Document::classify(value, path)? {
            document.append_to(&mut set, entity, path)?;
        }
    }

    Ok(set)
}
