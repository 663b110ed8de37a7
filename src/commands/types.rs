//! Command types: registered handler metadata.

use std::fmt;
use std::sync::Arc;

use super::traits::CommandHandler;

/// Metadata for one registered command.
#[derive(Clone)]
pub struct HandlerEntry {
    /// Owning extension. Empty for built-in commands.
    pub extension_name: String,
    /// Dispatch key, equal to the registry key the entry is stored under.
    pub command_name: String,
    /// Whether the handler is expected to block the calling context.
    ///
    /// Advisory only: the registry never acts on it, the host uses it to pick
    /// where the handler runs.
    pub blocking: bool,
    /// The handler itself.
    pub handler: Arc<dyn CommandHandler>,
}

impl HandlerEntry {
    pub fn new(
        extension_name: impl Into<String>,
        command_name: impl Into<String>,
        blocking: bool,
        handler: Arc<dyn CommandHandler>,
    ) -> Self {
        Self {
            extension_name: extension_name.into(),
            command_name: command_name.into(),
            blocking,
            handler,
        }
    }

    /// Whether this entry belongs to the core rather than to an extension.
    pub fn is_builtin(&self) -> bool {
        self.extension_name.is_empty()
    }
}

impl fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("extension_name", &self.extension_name)
            .field("command_name", &self.command_name)
            .field("blocking", &self.blocking)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentResult;
    use crate::protocol::Packet;

    fn noop(request: &Packet) -> AgentResult<Packet> {
        Ok(request.create_response())
    }

    #[test]
    fn test_builtin_flag() {
        let entry = HandlerEntry::new("", "core_enumextcmd", false, Arc::new(noop));
        assert!(entry.is_builtin());

        let entry = HandlerEntry::new("stdapi", "stdapi_fs_ls", true, Arc::new(noop));
        assert!(!entry.is_builtin());
        assert!(entry.blocking);
    }

    #[test]
    fn test_debug_omits_handler() {
        let entry = HandlerEntry::new("bar", "foo", false, Arc::new(noop));
        let rendered = format!("{:?}", entry);
        assert!(rendered.contains("\"foo\""));
        assert!(rendered.contains(".."));
    }
}
