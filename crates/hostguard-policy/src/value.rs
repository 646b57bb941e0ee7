//! Typed policy values

use hostguard_core::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// An immutable policy value addressed by `(category, section, key)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PolicyValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
    Map(BTreeMap<String, PolicyValue>),
}

impl PolicyValue {
    /// Convert a parsed YAML node; `path` is used in error messages
    pub fn from_yaml(value: &serde_yaml::Value, path: &str) -> Result<Self> {
        use serde_yaml::Value;

        match value {
            Value::Bool(b) => Ok(PolicyValue::Bool(*b)),
            Value::Number(n) => Ok(match n.as_i64() {
                Some(i) => PolicyValue::Int(i),
                None => PolicyValue::Str(n.to_string()),
            }),
            Value::String(s) => Ok(PolicyValue::Str(s.clone())),
            Value::Sequence(items) => items
                .iter()
                .map(|item| scalar_to_string(item, path))
                .collect::<Result<Vec<_>>>()
                .map(PolicyValue::List),
            Value::Mapping(mapping) => {
                let mut map = BTreeMap::new();
                for (k, v) in mapping {
                    let key = scalar_to_string(k, path)?;
                    let child = format!("{}.{}", path, key);
                    map.insert(key, PolicyValue::from_yaml(v, &child)?);
                }
                Ok(PolicyValue::Map(map))
            }
            Value::Tagged(tagged) => PolicyValue::from_yaml(&tagged.value, path),
            Value::Null => Err(Error::InvalidPolicy {
                key: path.to_string(),
                message: "null is not a valid policy value".into(),
            }),
        }
    }

    /// Short type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            PolicyValue::Bool(_) => "boolean",
            PolicyValue::Int(_) => "integer",
            PolicyValue::Str(_) => "string",
            PolicyValue::List(_) => "list",
            PolicyValue::Map(_) => "mapping",
        }
    }

    /// Whether `other` may replace this value when merging overrides
    pub fn same_shape(&self, other: &PolicyValue) -> bool {
        matches!(
            (self, other),
            (PolicyValue::Bool(_), PolicyValue::Bool(_))
                | (PolicyValue::Int(_), PolicyValue::Int(_))
                | (PolicyValue::Str(_), PolicyValue::Str(_))
                | (PolicyValue::Str(_), PolicyValue::Int(_))
                | (PolicyValue::List(_), PolicyValue::List(_))
                | (PolicyValue::Map(_), PolicyValue::Map(_))
        )
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PolicyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PolicyValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PolicyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            PolicyValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, PolicyValue>> {
        match self {
            PolicyValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Template truthiness: false, 0, and empty values are falsy
    pub fn is_truthy(&self) -> bool {
        match self {
            PolicyValue::Bool(b) => *b,
            PolicyValue::Int(i) => *i != 0,
            PolicyValue::Str(s) => !s.is_empty(),
            PolicyValue::List(items) => !items.is_empty(),
            PolicyValue::Map(map) => !map.is_empty(),
        }
    }
}

impl fmt::Display for PolicyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyValue::Bool(b) => write!(f, "{}", b),
            PolicyValue::Int(i) => write!(f, "{}", i),
            PolicyValue::Str(s) => f.write_str(s),
            PolicyValue::List(items) => f.write_str(&items.join("\n")),
            PolicyValue::Map(map) => {
                let pairs: Vec<String> = map.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                f.write_str(&pairs.join(","))
            }
        }
    }
}

impl From<bool> for PolicyValue {
    fn from(value: bool) -> Self {
        PolicyValue::Bool(value)
    }
}

impl From<i64> for PolicyValue {
    fn from(value: i64) -> Self {
        PolicyValue::Int(value)
    }
}

impl From<&str> for PolicyValue {
    fn from(value: &str) -> Self {
        PolicyValue::Str(value.to_string())
    }
}

impl From<String> for PolicyValue {
    fn from(value: String) -> Self {
        PolicyValue::Str(value)
    }
}

impl From<Vec<String>> for PolicyValue {
    fn from(value: Vec<String>) -> Self {
        PolicyValue::List(value)
    }
}

fn scalar_to_string(value: &serde_yaml::Value, path: &str) -> Result<String> {
    use serde_yaml::Value;

    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(Error::InvalidPolicy {
            key: path.to_string(),
            message: "expected a scalar".into(),
        }),
    }
}
