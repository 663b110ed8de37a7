//! Command registry: the live mapping from command name to handler.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use crate::error::AgentResult;
use crate::extensions::ExtensionLoader;
use crate::protocol::Packet;

use super::builtin;
use super::traits::CommandHandler;
use super::types::HandlerEntry;

/// Registry of all available commands.
///
/// Shared by every connection and mutated at runtime by `core_loadlib`, so
/// every operation takes the lock exactly once. Handlers are cloned out before
/// they run; the lock is never held across a handler call.
pub struct CommandRegistry {
    commands: RwLock<HashMap<String, HandlerEntry>>,
}

impl CommandRegistry {
    /// Create a registry seeded with the built-in commands.
    ///
    /// `loader` backs `core_loadlib`.
    pub fn new(loader: Arc<ExtensionLoader>) -> Arc<Self> {
        let registry = Arc::new_cyclic(|weak| {
            let registry = Self::empty();
            builtin::register_builtins(&registry, weak.clone(), loader);
            registry
        });

        info!(count = registry.len(), "Command registry initialized");

        registry
    }

    /// Create a registry with no commands at all.
    pub fn empty() -> Self {
        Self {
            commands: RwLock::new(HashMap::new()),
        }
    }

    // A panicking handler never runs under the lock and an insert is a
    // single call, so a poisoned map is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, HandlerEntry>> {
        self.commands.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, HandlerEntry>> {
        self.commands.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a closure as a command, replacing any entry with the same name.
    pub fn register<F>(
        &self,
        extension_name: impl Into<String>,
        command_name: impl Into<String>,
        blocking: bool,
        handler: F,
    ) where
        F: Fn(&Packet) -> AgentResult<Packet> + Send + Sync + 'static,
    {
        self.register_handler(extension_name, command_name, blocking, Arc::new(handler));
    }

    /// Register a handler object, replacing any entry with the same name.
    pub fn register_handler(
        &self,
        extension_name: impl Into<String>,
        command_name: impl Into<String>,
        blocking: bool,
        handler: Arc<dyn CommandHandler>,
    ) {
        let entry = HandlerEntry::new(extension_name, command_name, blocking, handler);
        let name = entry.command_name.clone();

        debug!(
            command = %name,
            extension = %entry.extension_name,
            blocking = entry.blocking,
            "Registering command"
        );

        // Bind first: the replaced handler is dropped after the guard, and
        // its drop may run extension code that re-enters the registry.
        let previous = self.write().insert(name, entry);
        if let Some(previous) = previous {
            debug!(
                command = %previous.command_name,
                extension = %previous.extension_name,
                "Replaced existing command"
            );
        }
    }

    /// Remove a command. Returns whether it was present.
    pub fn unregister(&self, command_name: &str) -> bool {
        let removed = self.write().remove(command_name);
        let removed = removed.is_some();
        if removed {
            debug!(command = command_name, "Unregistered command");
        }
        removed
    }

    /// Get a snapshot of a command's entry.
    pub fn get(&self, command_name: &str) -> Option<HandlerEntry> {
        self.read().get(command_name).cloned()
    }

    /// Names of the commands owned by `extension_name`, sorted.
    ///
    /// An empty name selects the built-in commands.
    pub fn commands_for_extension(&self, extension_name: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .read()
            .values()
            .filter(|entry| entry.extension_name == extension_name)
            .map(|entry| entry.command_name.clone())
            .collect();
        names.sort();
        names
    }

    /// Distinct names of the loaded extensions, sorted.
    pub fn extensions(&self) -> Vec<String> {
        self.read()
            .values()
            .filter(|entry| !entry.is_builtin())
            .map(|entry| entry.extension_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// List all registered command names.
    pub fn list_commands(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Weak;

    use crate::commands::Dispatcher;
    use crate::error::AgentError;
    use crate::extensions::{ExtensionCatalog, ManifestModuleLoader};
    use crate::protocol::{PacketResult, TlvType};

    fn test_registry() -> Arc<CommandRegistry> {
        let loader = ExtensionLoader::new(Arc::new(ManifestModuleLoader::new(
            ExtensionCatalog::new(),
        )));
        CommandRegistry::new(Arc::new(loader))
    }

    fn tagged(tag: &'static str) -> impl Fn(&Packet) -> AgentResult<Packet> + Send + Sync {
        move |request: &Packet| Ok(request.create_response().with(TlvType::String, tag))
    }

    #[test]
    fn test_registry_has_builtins() {
        let registry = test_registry();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("core_enumextcmd").is_some());
        assert!(registry.get("core_loadlib").is_some());
        assert!(registry.get("nonexistent").is_none());

        let builtins = registry.commands_for_extension("");
        assert_eq!(builtins, vec!["core_enumextcmd", "core_loadlib"]);
        assert!(registry.extensions().is_empty());
    }

    #[test]
    fn test_key_matches_command_name() {
        let registry = test_registry();
        registry.register("bar", "foo", false, tagged("foo"));

        for name in registry.list_commands() {
            let entry = registry.get(&name).unwrap();
            assert_eq!(entry.command_name, name);
        }
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = CommandRegistry::empty();
        registry.register("bar", "foo", false, tagged("foo"));
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister("foo"));
        assert_eq!(registry.len(), 0);
        assert!(!registry.unregister("foo"));
        assert!(!registry.unregister("never_registered"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_replaces() {
        let registry = CommandRegistry::empty();
        registry.register("bar", "foo", false, tagged("first"));
        registry.register("baz", "foo", true, tagged("second"));

        assert_eq!(registry.len(), 1);
        let entry = registry.get("foo").unwrap();
        assert_eq!(entry.extension_name, "baz");
        assert!(entry.blocking);

        let response = entry.handler.handle(&Packet::request("foo")).unwrap();
        assert_eq!(response.first_string(TlvType::String), Some("second"));

        // Replacing moves the command between extensions.
        assert!(registry.commands_for_extension("bar").is_empty());
        assert_eq!(registry.commands_for_extension("baz"), vec!["foo"]);
    }

    #[test]
    fn test_commands_for_extension_filters() {
        let registry = test_registry();
        registry.register("stdapi", "stdapi_fs_ls", true, tagged("ls"));
        registry.register("stdapi", "stdapi_fs_pwd", false, tagged("pwd"));
        registry.register("priv", "priv_elevate", true, tagged("elevate"));

        assert_eq!(
            registry.commands_for_extension("stdapi"),
            vec!["stdapi_fs_ls", "stdapi_fs_pwd"]
        );
        assert_eq!(registry.commands_for_extension("priv"), vec!["priv_elevate"]);
        assert!(registry.commands_for_extension("missing").is_empty());
        assert_eq!(registry.extensions(), vec!["priv", "stdapi"]);
    }

    #[test]
    fn test_handler_failure_is_opaque() {
        let registry = CommandRegistry::empty();
        registry.register("bar", "fails", false, |request: &Packet| {
            Ok(request.create_result_response(PacketResult::InvalidFunction))
        });
        registry.register("bar", "errors", false, |_request: &Packet| {
            Err(AgentError::Command {
                kind: crate::error::CommandErrorKind::ExecutionFailed {
                    message: "boom".to_string(),
                },
            })
        });

        let entry = registry.get("fails").unwrap();
        let response = entry.handler.handle(&Packet::request("fails")).unwrap();
        assert_eq!(response.result(), Some(PacketResult::InvalidFunction));

        let entry = registry.get("errors").unwrap();
        assert!(entry.handler.handle(&Packet::request("errors")).is_err());
    }

    /// Unregisters `command` when dropped, like an extension cleaning up
    /// after itself.
    struct UnregisterOnDrop {
        registry: Weak<CommandRegistry>,
        command: &'static str,
    }

    impl Drop for UnregisterOnDrop {
        fn drop(&mut self) {
            if let Some(registry) = self.registry.upgrade() {
                registry.unregister(self.command);
            }
        }
    }

    fn cleaning_handler(
        registry: &Arc<CommandRegistry>,
        command: &'static str,
    ) -> impl Fn(&Packet) -> AgentResult<Packet> + Send + Sync {
        let cleanup = UnregisterOnDrop {
            registry: Arc::downgrade(registry),
            command,
        };
        move |request: &Packet| {
            let _cleanup = &cleanup;
            Ok(request.create_response())
        }
    }

    #[test]
    fn test_replaced_handler_dropped_outside_lock() {
        let registry = Arc::new(CommandRegistry::empty());
        registry.register("bar", "foo", false, cleaning_handler(&registry, "sibling"));
        registry.register("bar", "sibling", false, tagged("sibling"));

        registry.register("bar", "foo", false, tagged("foo"));

        assert!(registry.get("sibling").is_none());
        assert_eq!(registry.commands_for_extension("bar"), vec!["foo"]);
    }

    #[test]
    fn test_unregistered_handler_dropped_outside_lock() {
        let registry = Arc::new(CommandRegistry::empty());
        registry.register("bar", "foo", false, cleaning_handler(&registry, "sibling"));
        registry.register("bar", "sibling", false, tagged("sibling"));

        assert!(registry.unregister("foo"));

        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_registration_and_dispatch() {
        let registry = test_registry();
        registry.register("base", "base_cmd", false, tagged("base"));
        let dispatcher = Dispatcher::new(Arc::clone(&registry));

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let registry = &registry;
                scope.spawn(move || {
                    for i in 0..50 {
                        let name = format!("cmd_{}_{}", worker, i);
                        registry.register("load", name, false, tagged("load"));
                    }
                });
            }
            for _ in 0..4 {
                let dispatcher = &dispatcher;
                scope.spawn(move || {
                    for _ in 0..50 {
                        let request = Packet::request("base_cmd");
                        let response = dispatcher.dispatch(&request).unwrap();
                        assert_eq!(response.request_id, request.request_id);
                        assert_eq!(response.strings(TlvType::String), vec!["base"]);

                        for name in dispatcher.registry().commands_for_extension("load") {
                            let response = dispatcher.dispatch(&Packet::request(name)).unwrap();
                            assert_eq!(response.strings(TlvType::String), vec!["load"]);
                        }
                    }
                });
            }
        });

        assert_eq!(registry.commands_for_extension("load").len(), 8 * 50);
        assert_eq!(registry.len(), 2 + 1 + 8 * 50);
        for worker in 0..8 {
            for i in 0..50 {
                let request = Packet::request(format!("cmd_{}_{}", worker, i));
                assert!(dispatcher.dispatch(&request).is_ok());
            }
        }
    }
}
