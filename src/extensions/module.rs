//! Loadable modules and the types they export.
//!
//! Turning payload bytes into something executable is the job of a
//! [`ModuleLoader`]. The extension loader only needs to list a module's
//! exported types, filter them by [`Capability`] and instantiate the match.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::error::{AgentError, ExtensionErrorKind};

use super::traits::{Capability, Extension};

/// Constructor for an extension type.
pub type ExtensionFactory = Arc<dyn Fn() -> Box<dyn Extension> + Send + Sync>;

/// Failure to load payload bytes as a module.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("malformed module: {message}")]
    Malformed { message: String },

    #[error("module has no name")]
    Unnamed,

    #[error("unresolved type '{name}' in module '{module}'")]
    UnresolvedType { module: String, name: String },
}

impl From<LoadError> for AgentError {
    fn from(err: LoadError) -> Self {
        AgentError::Extension {
            kind: ExtensionErrorKind::ModuleLoad {
                message: err.to_string(),
            },
        }
    }
}

/// Loads payload bytes as a module.
pub trait ModuleLoader: Send + Sync {
    fn load(&self, bytes: &[u8]) -> Result<Box<dyn Module>, LoadError>;
}

/// A loaded module.
pub trait Module {
    fn name(&self) -> &str;

    /// Every type the module exports.
    fn exported_types(&self) -> Vec<ExportedType>;
}

/// A type exported by a module.
#[derive(Clone)]
pub struct ExportedType {
    name: String,
    factory: Option<ExtensionFactory>,
}

impl ExportedType {
    /// An exported type implementing [`Capability::Extension`].
    pub fn extension(name: impl Into<String>, factory: ExtensionFactory) -> Self {
        Self {
            name: name.into(),
            factory: Some(factory),
        }
    }

    /// An exported type with no capability the loader cares about.
    pub fn opaque(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            factory: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn implements(&self, capability: Capability) -> bool {
        match capability {
            Capability::Extension => self.factory.is_some(),
        }
    }

    /// Create an instance of an extension type. `None` for other types.
    pub fn instantiate(&self) -> Option<Box<dyn Extension>> {
        self.factory.as_ref().map(|factory| factory())
    }
}

impl fmt::Debug for ExportedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportedType")
            .field("name", &self.name)
            .field("extension", &self.factory.is_some())
            .finish()
    }
}

/// Exported types of `module` implementing `capability`, in export order.
pub fn find_types_implementing(module: &dyn Module, capability: Capability) -> Vec<ExportedType> {
    module
        .exported_types()
        .into_iter()
        .filter(|ty| ty.implements(capability))
        .collect()
}
