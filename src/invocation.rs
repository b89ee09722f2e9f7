//! Definition invocations: "declare `definition` titled `title` with these parameters".

use im::OrdMap;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A parameter mapping. Keys are unique; ordering only keeps output stable.
pub type Params = OrdMap<String, Value>;

/// One declaration to compile-check.
///
/// Invocations are immutable: the builder methods return a new invocation and
/// leave `self` untouched, sharing structure with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub definition: String,
    pub title: String,
    #[serde(default)]
    pub params: Params,
}

impl Invocation {
    pub fn new(definition: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            definition: definition.into(),
            title: title.into(),
            params: Params::new(),
        }
    }

    /// Returns a copy with `name` set to `value`.
    pub fn with_param(&self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            params: self.params.update(name.into(), value.into()),
            ..self.clone()
        }
    }

    /// Returns a copy with every entry of `params` set, later entries winning.
    pub fn with_params<I, K, V>(&self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut merged = self.params.clone();
        for (k, v) in params {
            merged.insert(k.into(), v.into());
        }
        Self {
            params: merged,
            ..self.clone()
        }
    }

    /// Returns a copy without `name`.
    pub fn without_param(&self, name: &str) -> Self {
        Self {
            params: self.params.without(name),
            ..self.clone()
        }
    }

    pub fn with_title(&self, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..self.clone()
        }
    }

    /// The supplied value for `name`, treating `undef` as absent.
    pub fn supplied(&self, name: &str) -> Option<&Value> {
        self.params.get(name).filter(|v| !v.is_undef())
    }

    /// `Definition['title']`, the way a resource reference is written.
    pub fn reference(&self) -> String {
        let capitalized: Vec<String> = self
            .definition
            .split("::")
            .map(|segment| {
                let mut chars = segment.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect();
        format!("{}['{}']", capitalized.join("::"), self.title)
    }
}
