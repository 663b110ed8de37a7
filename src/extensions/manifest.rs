//! JSON manifest modules backed by a catalog of linked-in extension types.
//!
//! A payload is a module manifest:
//!
//! ```text
//! {
//!   "name": "ext_echo",
//!   "exports": [
//!     { "type": "echo", "implements": ["extension"] },
//!     { "type": "helper" }
//!   ]
//! }
//! ```
//!
//! Types declaring the `extension` capability must name an entry of the
//! loader's [`ExtensionCatalog`]; other exports are listed but never
//! instantiated.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{AgentError, AgentResult};

use super::echo::EchoExtension;
use super::module::{ExportedType, ExtensionFactory, LoadError, Module, ModuleLoader};
use super::traits::Extension;

const EXTENSION_CAPABILITY: &str = "extension";

#[derive(Debug, Deserialize)]
struct ModuleManifest {
    name: String,
    #[serde(default)]
    exports: Vec<ExportEntry>,
}

#[derive(Debug, Deserialize)]
struct ExportEntry {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    implements: Vec<String>,
}

/// Extension types a manifest may refer to, by type name.
#[derive(Clone, Default)]
pub struct ExtensionCatalog {
    factories: HashMap<String, ExtensionFactory>,
}

impl ExtensionCatalog {
    /// An empty catalog. Every extension export fails to resolve.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog of the extensions shipped with the agent.
    pub fn bundled() -> Self {
        Self::new().with::<EchoExtension>(EchoExtension::TYPE_NAME)
    }

    /// Subset of the bundled catalog, e.g. as listed in the configuration.
    pub fn from_names(names: &[String]) -> AgentResult<Self> {
        let bundled = Self::bundled();
        let mut catalog = Self::new();

        for name in names {
            let factory = bundled.factories.get(name).ok_or_else(|| AgentError::Config {
                message: format!(
                    "Unknown extension type '{}'. Bundled types: {:?}",
                    name,
                    bundled.names()
                ),
            })?;
            catalog.insert(name.clone(), Arc::clone(factory));
        }

        Ok(catalog)
    }

    /// Add a default-constructible extension type.
    pub fn with<E>(mut self, type_name: impl Into<String>) -> Self
    where
        E: Extension + Default + 'static,
    {
        self.insert(
            type_name,
            Arc::new(|| Box::new(E::default()) as Box<dyn Extension>),
        );
        self
    }

    /// Add or replace a type.
    pub fn insert(&mut self, type_name: impl Into<String>, factory: ExtensionFactory) {
        self.factories.insert(type_name.into(), factory);
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Type names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// [`ModuleLoader`] for JSON manifest payloads.
pub struct ManifestModuleLoader {
    catalog: ExtensionCatalog,
}

impl ManifestModuleLoader {
    pub fn new(catalog: ExtensionCatalog) -> Self {
        Self { catalog }
    }
}

impl ModuleLoader for ManifestModuleLoader {
    fn load(&self, bytes: &[u8]) -> Result<Box<dyn Module>, LoadError> {
        let manifest: ModuleManifest =
            serde_json::from_slice(bytes).map_err(|e| LoadError::Malformed {
                message: e.to_string(),
            })?;

        let name = manifest.name.trim().to_string();
        if name.is_empty() {
            return Err(LoadError::Unnamed);
        }

        let mut exports = Vec::with_capacity(manifest.exports.len());
        for export in manifest.exports {
            let is_extension = export
                .implements
                .iter()
                .any(|capability| capability == EXTENSION_CAPABILITY);

            if !is_extension {
                exports.push(ExportedType::opaque(export.type_name));
                continue;
            }

            let factory = self
                .catalog
                .factories
                .get(&export.type_name)
                .ok_or_else(|| LoadError::UnresolvedType {
                    module: name.clone(),
                    name: export.type_name.clone(),
                })?;
            exports.push(ExportedType::extension(export.type_name, Arc::clone(factory)));
        }

        Ok(Box::new(ManifestModule { name, exports }))
    }
}

struct ManifestModule {
    name: String,
    exports: Vec<ExportedType>,
}

impl Module for ManifestModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn exported_types(&self) -> Vec<ExportedType> {
        self.exports.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::Capability;

    fn load(loader: &ManifestModuleLoader, manifest: serde_json::Value) -> Result<Box<dyn Module>, LoadError> {
        loader.load(&serde_json::to_vec(&manifest).unwrap())
    }

    #[test]
    fn test_bundled_catalog() {
        let catalog = ExtensionCatalog::bundled();
        assert!(catalog.contains("echo"));
        assert_eq!(catalog.names(), vec!["echo"]);
    }

    #[test]
    fn test_from_names() {
        let catalog = ExtensionCatalog::from_names(&["echo".to_string()]).unwrap();
        assert_eq!(catalog.len(), 1);

        let catalog = ExtensionCatalog::from_names(&[]).unwrap();
        assert!(catalog.is_empty());

        let result = ExtensionCatalog::from_names(&["stdapi".to_string()]);
        assert!(matches!(result, Err(AgentError::Config { .. })));
    }

    #[test]
    fn test_load_manifest() {
        let loader = ManifestModuleLoader::new(ExtensionCatalog::bundled());
        let module = load(
            &loader,
            serde_json::json!({
                "name": "ext_echo",
                "exports": [
                    {"type": "helper", "implements": ["serializable"]},
                    {"type": "echo", "implements": ["extension"]}
                ]
            }),
        )
        .unwrap();

        assert_eq!(module.name(), "ext_echo");
        let exports = module.exported_types();
        assert_eq!(exports.len(), 2);
        assert!(!exports[0].implements(Capability::Extension));
        assert!(exports[1].implements(Capability::Extension));
    }

    #[test]
    fn test_malformed_payload() {
        let loader = ManifestModuleLoader::new(ExtensionCatalog::bundled());
        let result = loader.load(b"MZ\x90\x00not a manifest");
        assert!(matches!(result, Err(LoadError::Malformed { .. })));
    }

    #[test]
    fn test_unnamed_module() {
        let loader = ManifestModuleLoader::new(ExtensionCatalog::bundled());
        let result = load(&loader, serde_json::json!({"name": "  ", "exports": []}));
        assert!(matches!(result, Err(LoadError::Unnamed)));
    }

    #[test]
    fn test_unresolved_extension_type() {
        let loader = ManifestModuleLoader::new(ExtensionCatalog::new());
        let result = load(
            &loader,
            serde_json::json!({
                "name": "ext_echo",
                "exports": [{"type": "echo", "implements": ["extension"]}]
            }),
        );
        assert!(matches!(
            result,
            Err(LoadError::UnresolvedType { ref name, .. }) if name == "echo"
        ));
    }

    #[test]
    fn test_exports_default_to_empty() {
        let loader = ManifestModuleLoader::new(ExtensionCatalog::bundled());
        let module = load(&loader, serde_json::json!({"name": "empty"})).unwrap();
        assert!(module.exported_types().is_empty());
    }
}
