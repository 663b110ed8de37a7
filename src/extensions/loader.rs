//! Activates extension payloads.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::commands::CommandRegistry;
use crate::error::AgentResult;

use super::module::{find_types_implementing, ModuleLoader};
use super::registrar::ExtensionRegistrar;
use super::traits::Capability;

/// Why a module that loaded fine was not accepted as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// No exported type implements the extension capability.
    NoExtensionType,
    /// More than one exported type implements it; none is picked.
    AmbiguousExtensionType { count: usize },
    /// The extension type reports an empty name, which is reserved for
    /// built-in commands.
    UnnamedExtension,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoExtensionType => write!(f, "module exports no extension type"),
            Self::AmbiguousExtensionType { count } => {
                write!(f, "module exports {} extension types, expected one", count)
            }
            Self::UnnamedExtension => write!(f, "extension has an empty name"),
        }
    }
}

/// Result of a load attempt that got as far as a loaded module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded {
        /// Name of the loaded module.
        module: String,
        /// Name the extension registered its commands under.
        extension: String,
        /// The extension's commands after registration, sorted.
        commands: Vec<String>,
    },
    /// Nothing was registered.
    Rejected(RejectReason),
}

/// Turns payload bytes into a registered extension.
pub struct ExtensionLoader {
    modules: Arc<dyn ModuleLoader>,
}

impl ExtensionLoader {
    pub fn new(modules: Arc<dyn ModuleLoader>) -> Self {
        Self { modules }
    }

    /// Load `payload`, find its single extension type and let it register
    /// its commands into `registry`.
    ///
    /// A payload that is not a module at all is an error; a module without
    /// exactly one usable extension type is a [`LoadOutcome::Rejected`].
    pub fn load_extension(
        &self,
        registry: &Arc<CommandRegistry>,
        payload: &[u8],
    ) -> AgentResult<LoadOutcome> {
        let module = self.modules.load(payload)?;
        let module_name = module.name().to_string();

        let mut candidates = find_types_implementing(module.as_ref(), Capability::Extension);
        let extension_type = match candidates.len() {
            0 => return Ok(LoadOutcome::Rejected(RejectReason::NoExtensionType)),
            1 => candidates.remove(0),
            count => {
                return Ok(LoadOutcome::Rejected(
                    RejectReason::AmbiguousExtensionType { count },
                ))
            }
        };

        let Some(extension) = extension_type.instantiate() else {
            return Ok(LoadOutcome::Rejected(RejectReason::NoExtensionType));
        };

        let extension_name = extension.name().to_string();
        if extension_name.is_empty() {
            return Ok(LoadOutcome::Rejected(RejectReason::UnnamedExtension));
        }

        debug!(
            module = %module_name,
            extension_type = %extension_type.name(),
            extension = %extension_name,
            "Registering extension"
        );

        let registrar = ExtensionRegistrar::new(registry, &extension_name);
        extension.register(&registrar);

        Ok(LoadOutcome::Loaded {
            module: module_name,
            commands: registry.commands_for_extension(&extension_name),
            extension: extension_name,
        })
    }
}
