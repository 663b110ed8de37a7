//! Routes decoded requests to their registered handlers.

use std::sync::Arc;

use tracing::debug;

use crate::error::{AgentError, AgentResult};
use crate::extensions::{ExtensionCatalog, ExtensionLoader, ManifestModuleLoader};
use crate::protocol::Packet;

use super::registry::CommandRegistry;

/// Stateless request router. All state lives in the registry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self { registry }
    }

    /// Dispatcher over a fresh registry whose `core_loadlib` resolves
    /// manifest payloads against `catalog`.
    pub fn with_catalog(catalog: ExtensionCatalog) -> Self {
        let loader = ExtensionLoader::new(Arc::new(ManifestModuleLoader::new(catalog)));
        Self::new(CommandRegistry::new(Arc::new(loader)))
    }

    /// The registry this dispatcher routes through.
    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// Dispatch a request to the handler registered for its method.
    ///
    /// Returns exactly what the handler returns. A method with no handler is
    /// an `UnknownCommand` error, never an empty response.
    pub fn dispatch(&self, request: &Packet) -> AgentResult<Packet> {
        let entry = self
            .registry
            .get(&request.method)
            .ok_or_else(|| AgentError::unknown_command(&request.method))?;

        debug!(
            command = %entry.command_name,
            extension = %entry.extension_name,
            request_id = %request.request_id,
            "Dispatching request"
        );

        entry.handler.handle(request)
    }

    /// Whether the handler for `method` advertises itself as blocking.
    pub fn is_blocking(&self, method: &str) -> Option<bool> {
        self.registry.get(method).map(|entry| entry.blocking)
    }
}
