//! Attribute values carried by fixture records.

use serde::{Serialize, Serializer};
use std::fmt;

/// A single attribute value of a fixture record.
///
/// Values parsed from YAML keep their scalar type; CSV cells and
/// one-file-per-record values are always [`FixtureValue::String`]. Quoting for
/// the target database happens later, in the sink.
#[derive(Debug, Clone, PartialEq)]
pub enum FixtureValue {
    /// SQL NULL
    Null,

    /// Boolean value
    Bool(bool),

    /// 64-bit signed integer
    Integer(i64),

    /// 64-bit floating point
    Float(f64),

    /// Text value
    String(String),

    /// Nested sequence or mapping, stored as a JSON document
    Json(serde_json::Value),

    /// An SQL fragment that is already quoted and is emitted unchanged
    Raw(String),
}

impl FixtureValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as an i64, parsing strings that hold an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Try to get this value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert a YAML value into a fixture value.
    ///
    /// Sequences and mappings become [`FixtureValue::Json`]; tags are dropped.
    pub fn from_yaml(value: serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Null => Self::Null,
            serde_yaml::Value::Bool(b) => Self::Bool(b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    // Too large for i64: keep the digits rather than lose precision.
                    Self::String(u.to_string())
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_yaml::Value::String(s) => Self::String(s),
            serde_yaml::Value::Tagged(tagged) => Self::from_yaml(tagged.value),
            other @ (serde_yaml::Value::Sequence(_) | serde_yaml::Value::Mapping(_)) => {
                match serde_json::to_value(&other) {
                    Ok(json) => Self::Json(json),
                    // Mappings with non-string keys have no JSON form.
                    Err(_) => Self::String(serde_yaml::to_string(&other).unwrap_or_default()),
                }
            }
        }
    }

    /// Convert this value into JSON, used when records are displayed.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::String(s) | Self::Raw(s) => serde_json::Value::String(s.clone()),
            Self::Json(v) => v.clone(),
        }
    }
}

impl fmt::Display for FixtureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) | Self::Raw(s) => f.write_str(s),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

impl Serialize for FixtureValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for FixtureValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FixtureValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for FixtureValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FixtureValue {
    fn from(value: i32) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<bool> for FixtureValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for FixtureValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl<T: Into<FixtureValue>> From<Option<T>> for FixtureValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}
