//! Definition schemas: what parameters a definition accepts and of which type.
//!
//! A schema is normally read from the signature of a `define` in a manifest
//! (see [`parser`]), but can also be assembled in code.

use std::collections::HashSet;
use std::fmt;

use regex::Regex;
use serde::{Serialize, Serializer};

use crate::value::Value;

pub mod parser;

pub use parser::parse_definitions;

/// Inclusive bounds on a string length or an integer value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bounds {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl Bounds {
    pub const UNBOUNDED: Bounds = Bounds {
        min: None,
        max: None,
    };

    pub fn contains(&self, n: i64) -> bool {
        self.min.map_or(true, |min| n >= min) && self.max.map_or(true, |max| n <= max)
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (None, None) => Ok(()),
            (Some(min), None) => write!(f, "[{}]", min),
            (Some(min), Some(max)) => write!(f, "[{}, {}]", min, max),
            (None, Some(max)) => write!(f, "[default, {}]", max),
        }
    }
}

/// The declared type of a parameter.
#[derive(Debug, Clone)]
pub enum ParamType {
    Any,
    /// Length bounds count characters, not bytes.
    String(Bounds),
    Integer(Bounds),
    Float,
    Numeric,
    Boolean,
    /// Keys are always strings; the payload is the value type.
    Hash(Box<ParamType>),
    Array(Box<ParamType>),
    Optional(Box<ParamType>),
    Variant(Vec<ParamType>),
    Enum(Vec<String>),
    Pattern(Vec<Regex>),
}

impl ParamType {
    /// Returns true if `value` is an instance of this type. There is no
    /// coercion: the string `'1800'` is not an `Integer`.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (ParamType::Any, _) => true,
            (ParamType::Optional(_), Value::Undef) => true,
            (ParamType::Optional(inner), v) => inner.accepts(v),
            (ParamType::Variant(types), v) => types.iter().any(|t| t.accepts(v)),
            (ParamType::String(bounds), Value::String(s)) => {
                bounds.contains(s.chars().count() as i64)
            }
            (ParamType::Integer(bounds), Value::Integer(n)) => bounds.contains(*n),
            (ParamType::Float, Value::Float(_)) => true,
            (ParamType::Numeric, Value::Integer(_) | Value::Float(_)) => true,
            (ParamType::Boolean, Value::Boolean(_)) => true,
            (ParamType::Hash(inner), Value::Hash(map)) => map.values().all(|v| inner.accepts(v)),
            (ParamType::Array(inner), Value::Array(items)) => {
                items.iter().all(|item| inner.accepts(item))
            }
            (ParamType::Enum(choices), Value::String(s)) => choices.iter().any(|c| c == s),
            (ParamType::Pattern(patterns), Value::String(s)) => {
                patterns.iter().any(|re| re.is_match(s))
            }
            _ => false,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Any => write!(f, "Any"),
            ParamType::String(bounds) => write!(f, "String{}", bounds),
            ParamType::Integer(bounds) => write!(f, "Integer{}", bounds),
            ParamType::Float => write!(f, "Float"),
            ParamType::Numeric => write!(f, "Numeric"),
            ParamType::Boolean => write!(f, "Boolean"),
            ParamType::Hash(inner) => match **inner {
                ParamType::Any => write!(f, "Hash"),
                ref value => write!(f, "Hash[String, {}]", value),
            },
            ParamType::Array(inner) => write!(f, "Array[{}]", inner),
            ParamType::Optional(inner) => write!(f, "Optional[{}]", inner),
            ParamType::Variant(types) => {
                let parts: Vec<String> = types.iter().map(ToString::to_string).collect();
                write!(f, "Variant[{}]", parts.join(", "))
            }
            ParamType::Enum(choices) => {
                let parts: Vec<String> = choices.iter().map(|c| format!("'{}'", c)).collect();
                write!(f, "Enum[{}]", parts.join(", "))
            }
            ParamType::Pattern(patterns) => {
                let parts: Vec<String> =
                    patterns.iter().map(|re| format!("/{}/", re.as_str())).collect();
                write!(f, "Pattern[{}]", parts.join(", "))
            }
        }
    }
}

impl Serialize for ParamType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One declared parameter.
#[derive(Debug, Clone, Serialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
        }
    }

    pub fn with_default(name: impl Into<String>, ty: ParamType, default: Value) -> Self {
        Self {
            name: name.into(),
            ty,
            default: Some(default),
        }
    }

    /// A parameter without a default must be supplied by every invocation.
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// A problem found while assembling a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    /// The offending parameter, if the issue is about one.
    pub param: Option<String>,
    pub message: String,
}

/// The full signature of a definition.
#[derive(Debug, Clone, Serialize)]
pub struct DefinitionSchema {
    pub name: String,
    pub params: Vec<ParamSpec>,
}

impl DefinitionSchema {
    /// Builds a schema, rejecting duplicate parameter names and defaults that
    /// are not instances of their declared type.
    pub fn try_new(name: impl Into<String>, params: Vec<ParamSpec>) -> Result<Self, SchemaIssue> {
        let name = name.into();
        if name.is_empty() {
            return Err(SchemaIssue {
                param: None,
                message: "definition name must not be empty".to_string(),
            });
        }
        let mut seen = HashSet::new();
        for param in &params {
            if !seen.insert(param.name.as_str()) {
                return Err(SchemaIssue {
                    param: Some(param.name.clone()),
                    message: format!("parameter ${} is declared more than once", param.name),
                });
            }
            if let Some(default) = &param.default {
                if !param.ty.accepts(default) {
                    return Err(SchemaIssue {
                        param: Some(param.name.clone()),
                        message: format!(
                            "default {} for ${} does not match {}",
                            default, param.name, param.ty
                        ),
                    });
                }
            }
        }
        Ok(Self { name, params })
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Required parameters, in declaration order.
    pub fn required(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| p.is_required())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_accepts_undef_and_inner() {
        let ty = ParamType::Optional(Box::new(ParamType::String(Bounds::UNBOUNDED)));
        assert!(ty.accepts(&Value::Undef));
        assert!(ty.accepts(&Value::from("x")));
        assert!(!ty.accepts(&Value::Integer(1)));
    }

    #[test]
    fn no_coercion_between_strings_and_numbers() {
        assert!(!ParamType::Integer(Bounds::UNBOUNDED).accepts(&Value::from("1800")));
        assert!(!ParamType::String(Bounds::UNBOUNDED).accepts(&Value::Integer(1800)));
        assert!(ParamType::Numeric.accepts(&Value::Float(1.5)));
    }

    #[test]
    fn arrays_check_every_element() {
        let ty = ParamType::Array(Box::new(ParamType::Integer(Bounds::UNBOUNDED)));
        assert!(ty.accepts(&Value::Array(vec![])));
        assert!(ty.accepts(&Value::Array(vec![Value::Integer(1), Value::Integer(2)])));
        assert!(!ty.accepts(&Value::Array(vec![Value::Integer(1), Value::from("2")])));
    }

    #[test]
    fn enum_and_pattern_match_strings() {
        let ty = ParamType::Enum(vec!["running".into(), "stopped".into()]);
        assert!(ty.accepts(&Value::from("running")));
        assert!(!ty.accepts(&Value::from("paused")));

        let ty = ParamType::Pattern(vec![Regex::new(r"^\d+[smh]$").unwrap()]);
        assert!(ty.accepts(&Value::from("30m")));
        assert!(!ty.accepts(&Value::from("soon")));
    }

    #[test]
    fn display_round_trips_the_manifest_spelling() {
        let strings = ParamType::Array(Box::new(ParamType::String(Bounds::UNBOUNDED)));
        let ty = ParamType::Optional(Box::new(strings));
        assert_eq!(ty.to_string(), "Optional[Array[String]]");
        let ty = ParamType::Variant(vec![
            ParamType::Integer(Bounds::UNBOUNDED),
            ParamType::Enum(vec!["x".into()]),
        ]);
        assert_eq!(ty.to_string(), "Variant[Integer, Enum['x']]");
    }

    #[test]
    fn bounds_restrict_length_and_range() {
        let non_empty = ParamType::String(Bounds {
            min: Some(1),
            max: None,
        });
        assert!(non_empty.accepts(&Value::from("bob")));
        assert!(!non_empty.accepts(&Value::from("")));
        assert_eq!(non_empty.to_string(), "String[1]");

        let port = ParamType::Integer(Bounds {
            min: Some(1),
            max: Some(65535),
        });
        assert!(port.accepts(&Value::Integer(8140)));
        assert!(!port.accepts(&Value::Integer(0)));
        assert_eq!(port.to_string(), "Integer[1, 65535]");
    }

    #[test]
    fn hashes_check_values() {
        let ty = ParamType::Hash(Box::new(ParamType::String(Bounds::UNBOUNDED)));
        let mut map = std::collections::BTreeMap::new();
        map.insert("k".to_string(), Value::from("v"));
        assert!(ty.accepts(&Value::Hash(map.clone())));
        map.insert("n".to_string(), Value::Integer(1));
        assert!(!ty.accepts(&Value::Hash(map)));
        assert_eq!(ty.to_string(), "Hash[String, String]");
    }

    #[test]
    fn duplicate_parameters_are_rejected() {
        let issue = DefinitionSchema::try_new(
            "dup",
            vec![
                ParamSpec::required("user", ParamType::String(Bounds::UNBOUNDED)),
                ParamSpec::required("user", ParamType::String(Bounds::UNBOUNDED)),
            ],
        )
        .unwrap_err();
        assert_eq!(issue.param.as_deref(), Some("user"));
    }

    #[test]
    fn ill_typed_defaults_are_rejected() {
        let issue = DefinitionSchema::try_new(
            "bad_default",
            vec![ParamSpec::with_default(
                "interval",
                ParamType::Integer(Bounds::UNBOUNDED),
                Value::from("soon"),
            )],
        )
        .unwrap_err();
        assert!(issue.message.contains("does not match Integer"));
    }

    #[test]
    fn required_lists_parameters_without_defaults_in_order() {
        let schema = DefinitionSchema::try_new(
            "d",
            vec![
                ParamSpec::required("b", ParamType::Any),
                ParamSpec::with_default("a", ParamType::Any, Value::Undef),
                ParamSpec::required("c", ParamType::Any),
            ],
        )
        .unwrap();
        let names: Vec<&str> = schema.required().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
    }
}
