//! One-file-per-record fixture parsing.
//!
//! Each file in the fixture directory is one record, one `key => value` pair
//! per line:
//!
//! ```text
//! id => 1
//! name => Ruby on Rails
//! url => http://www.rubyonrails.org
//! ```

use fixture_core::{FixtureError, Record, Result};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static ATTRIBUTE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([a-zA-Z][-_\w]*)\s*=>\s*(.+)\s*$").expect("attribute pattern is valid")
});

/// Parse the text of one record file.
pub fn parse(text: &str, path: &Path) -> Result<Record> {
    let mut record = Record::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let captures = ATTRIBUTE_LINE.captures(line).ok_or_else(|| {
            FixtureError::format(
                path,
                format!("fixture format error at '{line}'.  Expecting 'key => value'."),
            )
        })?;
        let key = &captures[1];

        // Duplicate keys are almost always typos.
        if record.contains(key) {
            return Err(FixtureError::format(
                path,
                format!("duplicate '{key}' in fixture."),
            ));
        }
        record.insert(key, captures[2].trim().to_string());
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixture_core::FixtureValue;

    #[test]
    fn test_parse_record() {
        let text = "id => 1\n\n   \nname   =>   Ruby on Rails   \nurl => http://www.rubyonrails.org\n";
        let record = parse(text, Path::new("web_sites/ruby-on-rails")).unwrap();

        assert_eq!(record.columns().collect::<Vec<_>>(), vec!["id", "name", "url"]);
        assert_eq!(record.get("name"), Some(&FixtureValue::String("Ruby on Rails".into())));
    }

    #[test]
    fn test_value_may_contain_arrow() {
        let record = parse("body => a => b\n", Path::new("posts/one")).unwrap();
        assert_eq!(record.get("body"), Some(&FixtureValue::String("a => b".into())));
    }

    #[test]
    fn test_malformed_line_names_file_and_line() {
        let err = parse("id => 1\nfoo->bar\n", Path::new("sites/google")).unwrap_err();

        assert!(err.is_format());
        let message = err.to_string();
        assert!(message.starts_with("sites/google: "));
        assert!(message.contains("'foo->bar'"));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let err = parse("id => 1\nid => 2\n", Path::new("sites/google")).unwrap_err();
        assert!(err.to_string().contains("duplicate 'id' in fixture."));
    }

    #[test]
    fn test_key_must_start_with_letter() {
        assert!(parse("1id => 1\n", Path::new("x")).is_err());
        assert!(parse("_id => 1\n", Path::new("x")).is_err());
    }
}
