//! Rendering identifiers and values as SQL literals.
//!
//! Every dialect shares the same value rules and differs only in how it
//! quotes identifiers, strings and binary data:
//!
//! | value         | no column info     | with column type                        |
//! |---------------|--------------------|-----------------------------------------|
//! | `Null`        | `NULL`             | `NULL`                                  |
//! | `Raw(sql)`    | `sql` unchanged    | `sql` unchanged                         |
//! | `Bool`        | `TRUE` / `FALSE`   | converted to the column type            |
//! | `Integer`     | bare number        | converted to the column type            |
//! | `String`      | quoted string      | parsed/validated for non-text columns   |
//! | `Json`        | quoted JSON text   | quoted JSON text                        |
//!
//! An empty string bound for a non-text column renders as `NULL`, which is
//! what an empty CSV cell means for an integer or date column.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use fixture_core::{ColumnInfo, ColumnType, FixtureError, FixtureValue, Result};

/// Words that always need identifier quoting (PostgreSQL reserved keywords
/// plus the common SQL ones).
const RESERVED_WORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric",
    "authorization", "between", "binary", "both", "by", "case", "cast", "check", "collate",
    "collation", "column", "concurrently", "constraint", "create", "cross",
    "current_catalog", "current_date", "current_role", "current_schema", "current_time",
    "current_timestamp", "current_user", "default", "deferrable", "delete", "desc",
    "distinct", "do", "drop", "else", "end", "except", "false", "fetch", "for", "foreign",
    "freeze", "from", "full", "grant", "group", "having", "ilike", "in", "index", "initially",
    "inner", "insert", "intersect", "into", "is", "isnull", "join", "key", "lateral",
    "leading", "left", "like", "limit", "localtime", "localtimestamp", "natural", "not",
    "notnull", "null", "offset", "on", "only", "or", "order", "outer", "overlaps", "placing",
    "primary", "references", "returning", "right", "select", "session_user", "set",
    "similar", "some", "symmetric", "system_user", "table", "tablesample", "then", "to",
    "trailing", "true", "union", "unique", "update", "user", "using", "values", "variadic",
    "verbose", "when", "where", "window", "with",
];

/// A SQL dialect's quoting rules.
pub trait Quoter: Send + Sync {
    /// Quote a single identifier segment.
    fn quote_identifier_part(&self, part: &str) -> String;

    /// Quote a string literal. `value` never contains NUL bytes.
    fn quote_text(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Render binary data given as raw bytes.
    fn quote_binary(&self, bytes: &[u8]) -> String {
        format!("X'{}'", hex(bytes))
    }

    /// The `INSERT` for a row made only of column defaults.
    fn insert_defaults(&self, table: &str) -> String {
        format!("INSERT INTO {table} DEFAULT VALUES")
    }

    fn quote_bool(&self, value: bool) -> String {
        if value { "TRUE" } else { "FALSE" }.to_string()
    }

    /// Quote a possibly schema-qualified identifier, one segment at a time.
    fn quote_identifier(&self, name: &str) -> String {
        name.split('.')
            .map(|part| self.quote_identifier_part(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Quote a string, dropping NUL bytes no database accepts in text.
    fn quote_string(&self, value: &str) -> String {
        if value.contains('\0') {
            self.quote_text(&value.replace('\0', ""))
        } else {
            self.quote_text(value)
        }
    }

    /// Render `value` as a literal, using the column type when known.
    fn quote_value(&self, value: &FixtureValue, column: Option<&ColumnInfo>) -> Result<String> {
        match (value, column) {
            (FixtureValue::Null, _) => Ok("NULL".to_string()),
            (FixtureValue::Raw(sql), _) => Ok(sql.clone()),
            (value, Some(column)) => self.quote_typed(value, column),
            (FixtureValue::Bool(b), None) => Ok(self.quote_bool(*b)),
            (FixtureValue::Integer(i), None) => Ok(i.to_string()),
            (FixtureValue::Float(f), None) => Ok(render_float(self, *f)),
            (FixtureValue::String(s), None) => Ok(self.quote_string(s)),
            (FixtureValue::Json(json), None) => Ok(self.quote_string(&json.to_string())),
        }
    }

    /// Render a non-null, non-raw value for a column of known type.
    fn quote_typed(&self, value: &FixtureValue, column: &ColumnInfo) -> Result<String> {
        let invalid = |expected: &str| {
            FixtureError::value(
                &column.name,
                format!("expected {expected}, got {value:?}"),
            )
        };

        if let FixtureValue::String(s) = value {
            if s.trim().is_empty() && column.column_type != ColumnType::Text {
                return Ok("NULL".to_string());
            }
        }

        match column.column_type {
            ColumnType::Text => match value {
                FixtureValue::String(s) => Ok(self.quote_string(s)),
                FixtureValue::Json(json) => Ok(self.quote_string(&json.to_string())),
                other => Ok(self.quote_string(&other.to_string())),
            },
            ColumnType::Boolean => match value {
                FixtureValue::Bool(b) => Ok(self.quote_bool(*b)),
                FixtureValue::Integer(0) => Ok(self.quote_bool(false)),
                FixtureValue::Integer(1) => Ok(self.quote_bool(true)),
                FixtureValue::String(s) => parse_bool(s)
                    .map(|b| self.quote_bool(b))
                    .ok_or_else(|| invalid("a boolean")),
                _ => Err(invalid("a boolean")),
            },
            ColumnType::Integer => match value {
                FixtureValue::Integer(i) => Ok(i.to_string()),
                FixtureValue::Bool(b) => Ok(i64::from(*b).to_string()),
                FixtureValue::Float(f) if f.fract() == 0.0 && f.is_finite() => {
                    Ok(format!("{f:.0}"))
                }
                FixtureValue::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(|i| i.to_string())
                    .map_err(|_| invalid("an integer")),
                _ => Err(invalid("an integer")),
            },
            ColumnType::Float | ColumnType::Decimal => match value {
                FixtureValue::Integer(i) => Ok(i.to_string()),
                FixtureValue::Float(f) => Ok(render_float(self, *f)),
                FixtureValue::String(s) => match s.trim().parse::<f64>() {
                    // Keep the written digits so decimals do not lose precision.
                    Ok(f) if f.is_finite() => Ok(s.trim().to_string()),
                    Ok(f) if column.column_type == ColumnType::Float => {
                        Ok(render_float(self, f))
                    }
                    _ => Err(invalid("a finite number")),
                },
                _ => Err(invalid("a number")),
            },
            ColumnType::Date => match value {
                FixtureValue::String(s) => parse_date(s)
                    .map(|d| self.quote_text(&d.format("%Y-%m-%d").to_string()))
                    .ok_or_else(|| invalid("a date (YYYY-MM-DD)")),
                _ => Err(invalid("a date (YYYY-MM-DD)")),
            },
            ColumnType::Time => match value {
                FixtureValue::String(s) => parse_time(s)
                    .map(|t| self.quote_text(&t.format("%H:%M:%S%.f").to_string()))
                    .ok_or_else(|| invalid("a time (HH:MM:SS)")),
                _ => Err(invalid("a time (HH:MM:SS)")),
            },
            ColumnType::Timestamp => match value {
                FixtureValue::String(s) => parse_timestamp(s)
                    .map(|ts| self.quote_text(&ts))
                    .ok_or_else(|| invalid("a timestamp (YYYY-MM-DD HH:MM:SS)")),
                _ => Err(invalid("a timestamp (YYYY-MM-DD HH:MM:SS)")),
            },
            ColumnType::Json => match value {
                // Text that already is JSON is stored as written.
                FixtureValue::String(s) if serde_json::from_str::<serde_json::Value>(s).is_ok() => {
                    Ok(self.quote_string(s))
                }
                other => Ok(self.quote_string(&other.to_json().to_string())),
            },
            ColumnType::Binary => match value {
                FixtureValue::String(s) => Ok(self.quote_binary(s.as_bytes())),
                _ => Err(invalid("binary data as text")),
            },
        }
    }
}

fn render_float<Q: Quoter + ?Sized>(quoter: &Q, value: f64) -> String {
    if value.is_finite() {
        value.to_string()
    } else if value.is_nan() {
        quoter.quote_text("NaN")
    } else if value > 0.0 {
        quoter.quote_text("Infinity")
    } else {
        quoter.quote_text("-Infinity")
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" | "on" => Some(true),
        "false" | "f" | "no" | "n" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

/// Normalize a timestamp to `YYYY-MM-DD HH:MM:SS[.fff][+zz:zz]`.
fn parse_timestamp(value: &str) -> Option<String> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string());
        }
    }
    parse_date(value).map(|d| format!("{} 00:00:00", d.format("%Y-%m-%d")))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Whether `name` can appear unquoted in ANSI SQL.
fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    starts_ok
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !RESERVED_WORDS.contains(&name)
}

fn double_quote(part: &str) -> String {
    if is_plain_identifier(part) {
        part.to_string()
    } else {
        format!("\"{}\"", part.replace('"', "\"\""))
    }
}

/// Standard SQL quoting.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiQuoter;

impl Quoter for AnsiQuoter {
    fn quote_identifier_part(&self, part: &str) -> String {
        double_quote(part)
    }
}

/// PostgreSQL quoting (`standard_conforming_strings = on`).
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresQuoter;

impl Quoter for PostgresQuoter {
    fn quote_identifier_part(&self, part: &str) -> String {
        double_quote(part)
    }

    fn quote_binary(&self, bytes: &[u8]) -> String {
        format!("'\\x{}'::bytea", hex(bytes))
    }
}

/// MySQL quoting. Backslash is an escape character in MySQL string literals.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlQuoter;

impl Quoter for MySqlQuoter {
    fn quote_identifier_part(&self, part: &str) -> String {
        format!("`{}`", part.replace('`', "``"))
    }

    fn insert_defaults(&self, table: &str) -> String {
        format!("INSERT INTO {table} () VALUES ()")
    }

    fn quote_text(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('\'');
        for c in value.chars() {
            match c {
                '\'' => out.push_str("''"),
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\u{1a}' => out.push_str("\\Z"),
                c => out.push(c),
            }
        }
        out.push('\'');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column(column_type: ColumnType) -> ColumnInfo {
        ColumnInfo::new("c", column_type)
    }

    #[test]
    fn test_identifiers_quoted_only_when_needed() {
        let q = AnsiQuoter;
        assert_eq!(q.quote_identifier("sites"), "sites");
        assert_eq!(q.quote_identifier("web_sites2"), "web_sites2");
        assert_eq!(q.quote_identifier("Sites"), "\"Sites\"");
        assert_eq!(q.quote_identifier("user"), "\"user\"");
        assert_eq!(q.quote_identifier("odd\"name"), "\"odd\"\"name\"");
        assert_eq!(q.quote_identifier("public.user"), "public.\"user\"");
    }

    #[test]
    fn test_mysql_identifiers_always_quoted() {
        assert_eq!(MySqlQuoter.quote_identifier("sites"), "`sites`");
        assert_eq!(MySqlQuoter.quote_identifier("db.we`ird"), "`db`.`we``ird`");
    }

    #[test]
    fn test_untyped_values() {
        let q = AnsiQuoter;
        assert_eq!(q.quote_value(&FixtureValue::Null, None).unwrap(), "NULL");
        assert_eq!(q.quote_value(&FixtureValue::Integer(42), None).unwrap(), "42");
        assert_eq!(q.quote_value(&FixtureValue::Float(1.5), None).unwrap(), "1.5");
        assert_eq!(q.quote_value(&FixtureValue::Bool(true), None).unwrap(), "TRUE");
        assert_eq!(q.quote_value(&"O'Reilly".into(), None).unwrap(), "'O''Reilly'");
        assert_eq!(
            q.quote_value(&FixtureValue::Raw("NOW()".into()), None).unwrap(),
            "NOW()"
        );
        assert_eq!(
            q.quote_value(&FixtureValue::Json(json!({"a": [1]})), None).unwrap(),
            r#"'{"a":[1]}'"#
        );
    }

    #[test]
    fn test_nul_bytes_are_stripped() {
        assert_eq!(AnsiQuoter.quote_string("a\0b"), "'ab'");
    }

    #[test]
    fn test_backslashes() {
        assert_eq!(AnsiQuoter.quote_string(r"C:\dir"), r"'C:\dir'");
        assert_eq!(MySqlQuoter.quote_string(r"C:\dir"), r"'C:\\dir'");
        assert_eq!(MySqlQuoter.quote_string("it's\n"), r"'it''s\n'");
    }

    #[test]
    fn test_integer_column_accepts_numeric_text() {
        let q = AnsiQuoter;
        let int = column(ColumnType::Integer);
        assert_eq!(q.quote_value(&" 7 ".into(), Some(&int)).unwrap(), "7");
        assert_eq!(q.quote_value(&"".into(), Some(&int)).unwrap(), "NULL");

        let err = q.quote_value(&"seven".into(), Some(&int)).unwrap_err();
        assert!(matches!(err, FixtureError::Value { ref column, .. } if column == "c"));
    }

    #[test]
    fn test_decimal_keeps_written_digits() {
        let dec = column(ColumnType::Decimal);
        assert_eq!(
            AnsiQuoter.quote_value(&"10.500".into(), Some(&dec)).unwrap(),
            "10.500"
        );
    }

    #[test]
    fn test_boolean_column() {
        let q = PostgresQuoter;
        let b = column(ColumnType::Boolean);
        assert_eq!(q.quote_value(&"t".into(), Some(&b)).unwrap(), "TRUE");
        assert_eq!(q.quote_value(&FixtureValue::Integer(0), Some(&b)).unwrap(), "FALSE");
        assert!(q.quote_value(&"maybe".into(), Some(&b)).is_err());
    }

    #[test]
    fn test_text_column_quotes_numbers() {
        let text = column(ColumnType::Text);
        assert_eq!(
            AnsiQuoter.quote_value(&FixtureValue::Integer(5), Some(&text)).unwrap(),
            "'5'"
        );
        assert_eq!(AnsiQuoter.quote_value(&"".into(), Some(&text)).unwrap(), "''");
    }

    #[test]
    fn test_temporal_columns_are_validated() {
        let q = AnsiQuoter;
        let date = column(ColumnType::Date);
        let ts = column(ColumnType::Timestamp);
        let time = column(ColumnType::Time);

        assert_eq!(q.quote_value(&"2004-10-01".into(), Some(&date)).unwrap(), "'2004-10-01'");
        assert!(q.quote_value(&"2004-13-01".into(), Some(&date)).is_err());
        assert_eq!(
            q.quote_value(&"2004-10-01 12:30:00".into(), Some(&ts)).unwrap(),
            "'2004-10-01 12:30:00'"
        );
        assert_eq!(
            q.quote_value(&"2004-10-01".into(), Some(&ts)).unwrap(),
            "'2004-10-01 00:00:00'"
        );
        assert_eq!(
            q.quote_value(&"2004-10-01T12:30:00Z".into(), Some(&ts)).unwrap(),
            "'2004-10-01 12:30:00+00:00'"
        );
        assert_eq!(q.quote_value(&"09:15".into(), Some(&time)).unwrap(), "'09:15:00'");
        assert!(q.quote_value(&FixtureValue::Integer(3), Some(&date)).is_err());
    }

    #[test]
    fn test_json_column() {
        let j = column(ColumnType::Json);
        assert_eq!(
            AnsiQuoter.quote_value(&r#"{"a":1}"#.into(), Some(&j)).unwrap(),
            r#"'{"a":1}'"#
        );
        assert_eq!(
            AnsiQuoter.quote_value(&"plain".into(), Some(&j)).unwrap(),
            r#"'"plain"'"#
        );
    }

    #[test]
    fn test_binary_column() {
        let bin = column(ColumnType::Binary);
        assert_eq!(AnsiQuoter.quote_value(&"AB".into(), Some(&bin)).unwrap(), "X'4142'");
        assert_eq!(
            PostgresQuoter.quote_value(&"AB".into(), Some(&bin)).unwrap(),
            r"'\x4142'::bytea"
        );
    }

    #[test]
    fn test_non_finite_floats_are_quoted() {
        assert_eq!(
            AnsiQuoter.quote_value(&FixtureValue::Float(f64::NAN), None).unwrap(),
            "'NaN'"
        );
    }

    #[test]
    fn test_non_finite_text_in_float_column() {
        let float = column(ColumnType::Float);
        let q = PostgresQuoter;
        assert_eq!(q.quote_value(&"inf".into(), Some(&float)).unwrap(), "'Infinity'");
        assert_eq!(q.quote_value(&"-infinity".into(), Some(&float)).unwrap(), "'-Infinity'");
        assert_eq!(q.quote_value(&"NaN".into(), Some(&float)).unwrap(), "'NaN'");

        let dec = column(ColumnType::Decimal);
        let err = q.quote_value(&"inf".into(), Some(&dec)).unwrap_err();
        assert!(matches!(err, FixtureError::Value { .. }));
    }

    #[test]
    fn test_reserved_keywords_are_quoted() {
        for word in ["for", "only", "window", "fetch", "array", "both", "true", "current_user"] {
            assert_eq!(PostgresQuoter.quote_identifier(word), format!("\"{word}\""));
        }
        assert_eq!(PostgresQuoter.quote_identifier("title"), "title");
    }

    #[test]
    fn test_insert_defaults_per_dialect() {
        assert_eq!(
            PostgresQuoter.insert_defaults("sites"),
            "INSERT INTO sites DEFAULT VALUES"
        );
        assert_eq!(
            MySqlQuoter.insert_defaults("`sites`"),
            "INSERT INTO `sites` () VALUES ()"
        );
    }
}
