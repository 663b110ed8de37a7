//! The narrow registry handle given to extensions.

use std::sync::{Arc, Weak};

use tracing::warn;

use crate::commands::{CommandHandler, CommandRegistry};
use crate::error::AgentResult;
use crate::protocol::Packet;

/// Register/unregister access to the command registry, scoped to one
/// extension name.
///
/// Extensions may keep a clone (e.g. to unregister a command later). The
/// handle holds the registry weakly, so a clone captured inside a handler
/// does not keep the registry alive; once the registry is gone every call is
/// a no-op.
#[derive(Clone)]
pub struct ExtensionRegistrar {
    registry: Weak<CommandRegistry>,
    extension_name: String,
}

impl ExtensionRegistrar {
    pub(crate) fn new(registry: &Arc<CommandRegistry>, extension_name: impl Into<String>) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            extension_name: extension_name.into(),
        }
    }

    /// Name the registered commands are tagged with.
    pub fn extension_name(&self) -> &str {
        &self.extension_name
    }

    /// Register a closure as a command of this extension.
    pub fn register<F>(&self, command_name: impl Into<String>, blocking: bool, handler: F)
    where
        F: Fn(&Packet) -> AgentResult<Packet> + Send + Sync + 'static,
    {
        self.register_handler(command_name, blocking, Arc::new(handler));
    }

    /// Register a handler object as a command of this extension.
    pub fn register_handler(
        &self,
        command_name: impl Into<String>,
        blocking: bool,
        handler: Arc<dyn CommandHandler>,
    ) {
        let command_name = command_name.into();
        match self.registry.upgrade() {
            Some(registry) => {
                registry.register_handler(&self.extension_name, command_name, blocking, handler)
            }
            None => warn!(
                extension = %self.extension_name,
                command = %command_name,
                "Registry gone, dropping registration"
            ),
        }
    }

    /// Remove a command. Absent commands are ignored.
    pub fn unregister(&self, command_name: &str) -> bool {
        self.registry
            .upgrade()
            .map(|registry| registry.unregister(command_name))
            .unwrap_or(false)
    }
}
