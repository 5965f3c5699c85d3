//! # Modules
//!
//! Applications group controllers into named modules that may import each
//! other. The graph is resolved once at boot into an import-first order, so
//! routes of imported modules precede the routes of their importers.
//!
//! A [`ModuleManifest`] is the declarative form of the same data, loaded from
//! TOML or JSON by the CLI and by applications that keep routing in a file.

use crate::descriptor::ControllerDescriptor;
use crate::error::{ConfigurationError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Named group of declarations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleDeclaration {
    /// Module name
    pub name: String,
    /// Names of imported modules
    #[serde(default)]
    pub imports: Vec<String>,
    /// Declared types, controllers or not
    #[serde(default)]
    pub declarations: Vec<ControllerDescriptor>,
}

impl ModuleDeclaration {
    /// Create an empty module
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Import another module
    #[must_use]
    pub fn import(mut self, module: impl Into<String>) -> Self {
        self.imports.push(module.into());
        self
    }

    /// Declare a type
    #[must_use]
    pub fn declare(mut self, declaration: ControllerDescriptor) -> Self {
        self.declarations.push(declaration);
        self
    }
}

/// Import graph over a set of modules
#[derive(Debug)]
pub struct ModuleGraph<'a> {
    modules: &'a [ModuleDeclaration],
    index: HashMap<&'a str, usize>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

impl<'a> ModuleGraph<'a> {
    /// Index the modules and check names and imports
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::DuplicateModule`,
    /// `ConfigurationError::DuplicateImport` or
    /// `ConfigurationError::UnknownImport`.
    pub fn new(modules: &'a [ModuleDeclaration]) -> std::result::Result<Self, ConfigurationError> {
        let mut index = HashMap::with_capacity(modules.len());
        for (position, module) in modules.iter().enumerate() {
            if index.insert(module.name.as_str(), position).is_some() {
                return Err(ConfigurationError::DuplicateModule {
                    name: module.name.clone(),
                });
            }
        }

        for module in modules {
            let mut seen = HashSet::new();
            for import in &module.imports {
                if !seen.insert(import.as_str()) {
                    return Err(ConfigurationError::DuplicateImport {
                        module: module.name.clone(),
                        import: import.clone(),
                    });
                }
                if !index.contains_key(import.as_str()) {
                    return Err(ConfigurationError::UnknownImport {
                        module: module.name.clone(),
                        import: import.clone(),
                    });
                }
            }
        }

        Ok(Self { modules, index })
    }

    /// Resolve modules in import-first order, each exactly once
    ///
    /// # Errors
    ///
    /// Everything [`ModuleGraph::new`] rejects, plus
    /// `ConfigurationError::ImportCycle`.
    pub fn resolve(
        modules: &'a [ModuleDeclaration],
    ) -> std::result::Result<Vec<&'a ModuleDeclaration>, ConfigurationError> {
        Self::new(modules)?.order()
    }

    /// Depth-first order, imports before importers
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::ImportCycle` naming the modules on the
    /// cycle.
    pub fn order(&self) -> std::result::Result<Vec<&'a ModuleDeclaration>, ConfigurationError> {
        let mut state: HashMap<usize, Visit> = HashMap::new();
        let mut order = Vec::with_capacity(self.modules.len());
        let mut stack = Vec::new();
        for position in 0..self.modules.len() {
            self.visit(position, &mut state, &mut stack, &mut order)?;
        }
        Ok(order)
    }

    fn visit(
        &self,
        position: usize,
        state: &mut HashMap<usize, Visit>,
        stack: &mut Vec<usize>,
        order: &mut Vec<&'a ModuleDeclaration>,
    ) -> std::result::Result<(), ConfigurationError> {
        match state.get(&position) {
            Some(Visit::Done) => return Ok(()),
            Some(Visit::InProgress) => {
                let start = stack.iter().position(|p| *p == position).unwrap_or(0);
                let mut cycle: Vec<String> = stack[start..]
                    .iter()
                    .map(|p| self.modules[*p].name.clone())
                    .collect();
                cycle.push(self.modules[position].name.clone());
                return Err(ConfigurationError::ImportCycle { cycle });
            }
            None => {}
        }

        state.insert(position, Visit::InProgress);
        stack.push(position);
        let module = &self.modules[position];
        for import in &module.imports {
            if let Some(&next) = self.index.get(import.as_str()) {
                self.visit(next, state, stack, order)?;
            }
        }
        stack.pop();
        state.insert(position, Visit::Done);
        order.push(module);
        Ok(())
    }
}

/// Declarative module list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// Modules in declaration order
    #[serde(default)]
    pub modules: Vec<ModuleDeclaration>,
}

impl ModuleManifest {
    /// Load a manifest; `.json` files are read as JSON, anything else as TOML
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read, `Error::Json` or
    /// `Error::Config` if it does not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Ok(serde_json::from_str(&content)?)
        } else {
            Self::from_toml_str(&content)
        }
    }

    /// Parse a TOML manifest
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the text is not a valid manifest.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(order: &[&ModuleDeclaration]) -> Vec<String> {
        order.iter().map(|m| m.name.clone()).collect()
    }

    #[test]
    fn test_imports_come_first() {
        let modules = vec![
            ModuleDeclaration::new("app").import("store").import("shared"),
            ModuleDeclaration::new("store").import("shared"),
            ModuleDeclaration::new("shared"),
        ];
        let order = ModuleGraph::resolve(&modules).unwrap();
        assert_eq!(names(&order), vec!["shared", "store", "app"]);
    }

    #[test]
    fn test_duplicate_module() {
        let modules = vec![ModuleDeclaration::new("a"), ModuleDeclaration::new("a")];
        assert_eq!(
            ModuleGraph::resolve(&modules).unwrap_err(),
            ConfigurationError::DuplicateModule { name: "a".into() }
        );
    }

    #[test]
    fn test_duplicate_and_unknown_import() {
        let modules = vec![
            ModuleDeclaration::new("a").import("b").import("b"),
            ModuleDeclaration::new("b"),
        ];
        assert!(matches!(
            ModuleGraph::resolve(&modules).unwrap_err(),
            ConfigurationError::DuplicateImport { .. }
        ));

        let modules = vec![ModuleDeclaration::new("a").import("ghost")];
        assert!(matches!(
            ModuleGraph::resolve(&modules).unwrap_err(),
            ConfigurationError::UnknownImport { .. }
        ));
    }

    #[test]
    fn test_cycle_is_reported() {
        let modules = vec![
            ModuleDeclaration::new("a").import("b"),
            ModuleDeclaration::new("b").import("c"),
            ModuleDeclaration::new("c").import("a"),
        ];
        let err = ModuleGraph::resolve(&modules).unwrap_err();
        assert_eq!(err.to_string(), "module import cycle: a -> b -> c -> a");
    }

    #[test]
    fn test_manifest_from_toml() {
        let manifest = ModuleManifest::from_toml_str(
            r#"
            [[modules]]
            name = "store"

            [[modules.declarations]]
            name = "ProductController"
            controller = true
            routes = ["[area]/products/"]
            area = "store-api"

            [[modules.declarations.actions]]
            name = "productList"
            verbs = [{ verb = "GET" }]
            "#,
        )
        .unwrap();
        let store = &manifest.modules[0];
        assert_eq!(store.declarations[0].name, "ProductController");
        assert_eq!(store.declarations[0].actions[0].verbs.len(), 1);
    }
}
