//! Catalog of known definitions.
//!
//! The catalog is the "external collaborator" a compiler check resolves names
//! against. It is filled from manifest sources and is read-only while checks
//! run, so a single `&Catalog` can be shared across threads.
//!
//! | Method              | Overwrites | Error on Duplicate |
//! |---------------------|------------|--------------------|
//! | `register`          | Yes        | No                 |
//! | `register_or_error` | No         | Yes                |
//! | `load_source`       | No         | Yes                |
//! | `load_file`         | No         | Yes                |
//! | `load_dir`          | No         | Yes                |

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::errors::{DefcheckError, DefcheckResult};
use crate::schema::{parse_definitions, DefinitionSchema};

const BUILTIN_SOURCES: &[(&str, &str)] = &[(
    "definitions/puppet_nonroot.pp",
    include_str!("../definitions/puppet_nonroot.pp"),
)];

/// Registry of definition schemas keyed by name.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Catalog {
    definitions: BTreeMap<String, DefinitionSchema>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The definitions bundled with defcheck.
    pub fn builtin() -> DefcheckResult<Self> {
        let mut catalog = Self::new();
        for (name, text) in BUILTIN_SOURCES {
            catalog.load_source(name, text)?;
        }
        Ok(catalog)
    }

    /// Registers a schema, returning the one it replaced.
    pub fn register(&mut self, schema: DefinitionSchema) -> Option<DefinitionSchema> {
        self.definitions.insert(schema.name.clone(), schema)
    }

    /// Registers a schema, refusing to replace an existing one.
    pub fn register_or_error(&mut self, schema: DefinitionSchema) -> DefcheckResult<()> {
        if self.definitions.contains_key(&schema.name) {
            return Err(DefcheckError::DuplicateDefinition { name: schema.name });
        }
        self.definitions.insert(schema.name.clone(), schema);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&DefinitionSchema> {
        self.definitions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Definition names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &DefinitionSchema> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Parses manifest text and registers every definition in it.
    /// Returns how many definitions were added.
    pub fn load_source(&mut self, source_name: &str, text: &str) -> DefcheckResult<usize> {
        let definitions = parse_definitions(source_name, text)?;
        let count = definitions.len();
        for schema in definitions {
            debug!(definition = %schema.name, source = source_name, "registered definition");
            self.register_or_error(schema)?;
        }
        Ok(count)
    }

    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> DefcheckResult<usize> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| DefcheckError::io("read", path, e))?;
        self.load_source(&path.display().to_string(), &text)
    }

    /// Loads every `*.pp` file under `root`, in sorted path order.
    pub fn load_dir<P: AsRef<Path>>(&mut self, root: P) -> DefcheckResult<usize> {
        let mut total = 0;
        for path in manifest_files(root.as_ref())? {
            total += self.load_file(&path)?;
        }
        info!(root = %root.as_ref().display(), definitions = total, "loaded manifests");
        Ok(total)
    }

    /// Loads a file or a directory, whichever `path` is.
    pub fn load_path<P: AsRef<Path>>(&mut self, path: P) -> DefcheckResult<usize> {
        let path = path.as_ref();
        if path.is_dir() {
            self.load_dir(path)
        } else {
            self.load_file(path)
        }
    }
}

fn is_manifest(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "pp")
}

fn manifest_files(root: &Path) -> DefcheckResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| DefcheckError::walk(root, e))?;
        if entry.file_type().is_file() && is_manifest(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ParamSpec, ParamType};

    fn schema(name: &str) -> DefinitionSchema {
        DefinitionSchema::try_new(name, vec![ParamSpec::required("x", ParamType::Any)]).unwrap()
    }

    #[test]
    fn builtin_catalog_has_puppet_nonroot() {
        let catalog = Catalog::builtin().unwrap();
        let def = catalog.lookup("puppet_nonroot").unwrap();
        let required: Vec<&str> = def.required().map(|p| p.name.as_str()).collect();
        assert_eq!(required, vec!["user", "puppet_master_fqdn", "challenge_password"]);
    }

    #[test]
    fn register_overwrites_silently() {
        let mut catalog = Catalog::new();
        assert!(catalog.register(schema("a")).is_none());
        assert!(catalog.register(schema("a")).is_some());
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn register_or_error_refuses_duplicates() {
        let mut catalog = Catalog::new();
        catalog.register_or_error(schema("a")).unwrap();
        let err = catalog.register_or_error(schema("a")).unwrap_err();
        assert!(matches!(err, DefcheckError::DuplicateDefinition { name } if name == "a"));
    }

    #[test]
    fn names_are_sorted() {
        let mut catalog = Catalog::new();
        catalog.register(schema("zeta"));
        catalog.register(schema("alpha"));
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["alpha", "zeta"]);
    }
}
