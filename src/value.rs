//! Parameter values.
//!
//! Values arrive from three places: default literals in manifests, YAML suite
//! documents, and `key=value` pairs on the command line. All of them land in
//! this one enum so the compiler check never has to care where a value came from.

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// An untyped parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// The absent value. Supplying it is the same as not supplying the key.
    Undef,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Hash(BTreeMap<String, Value>),
}

impl Value {
    /// The type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undef => "Undef",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Array(_) => "Array",
            Value::Hash(_) => "Hash",
        }
    }

    pub fn is_undef(&self) -> bool {
        matches!(self, Value::Undef)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Parses a command-line value using YAML scalar rules, so `1800` is an
    /// integer and `'1800'` stays a string.
    ///
    /// Only plain decimal numbers, booleans, `null`/`~`, and fully quoted
    /// strings are interpreted. Anything else (comments, anchors, flow or
    /// block collections, hex literals) is kept verbatim as a string.
    pub fn from_cli(raw: &str) -> Value {
        let interpreted = if PLAIN_SCALAR.is_match(raw) || is_quoted(raw) {
            serde_yaml::from_str::<serde_yaml::Value>(raw).ok()
        } else {
            None
        };
        match interpreted {
            Some(serde_yaml::Value::Null) => Value::Undef,
            Some(serde_yaml::Value::Bool(b)) => Value::Boolean(b),
            Some(serde_yaml::Value::Number(n)) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n
                    .as_f64()
                    .map(Value::Float)
                    .unwrap_or_else(|| Value::String(raw.to_string())),
            },
            Some(serde_yaml::Value::String(s)) if is_quoted(raw) => Value::String(s),
            _ => Value::String(raw.to_string()),
        }
    }
}

static PLAIN_SCALAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(~|null|Null|NULL|true|True|TRUE|false|False|FALSE|-?[0-9]+(\.[0-9]+)?([eE][-+]?[0-9]+)?)$",
    )
    .expect("scalar pattern is valid")
});

fn is_quoted(raw: &str) -> bool {
    raw.len() >= 2
        && ((raw.starts_with('\'') && raw.ends_with('\''))
            || (raw.starts_with('"') && raw.ends_with('"')))
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undef => write!(f, "undef"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{:?}", n),
            Value::String(s) => {
                write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
            }
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Hash(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " '{}' => {}", k, v)?;
                }
                if !map.is_empty() {
                    write!(f, " ")?;
                }
                write!(f, "}}")
            }
        }
    }
}
