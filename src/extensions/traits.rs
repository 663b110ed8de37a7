//! Extension capability trait.

use super::registrar::ExtensionRegistrar;

/// Capabilities a type exported by a module can implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// The type is an [`Extension`] entry point.
    Extension,
}

/// Entry point of a runtime-loaded extension.
///
/// A module payload exports exactly one type with this capability. The loader
/// instantiates it and calls [`register`](Extension::register) once; inside
/// that call the extension adds its commands.
///
/// # Example
///
/// ```ignore
/// struct Bar;
///
/// impl Extension for Bar {
///     fn name(&self) -> &str {
///         "bar"
///     }
///
///     fn register(&self, registrar: &ExtensionRegistrar) {
///         registrar.register("foo", false, |request: &Packet| {
///             Ok(request.create_result_response(PacketResult::Success))
///         });
///     }
/// }
/// ```
pub trait Extension: Send + Sync {
    /// Extension name every registered command is tagged with. Must not be
    /// empty; the empty name belongs to the built-in commands.
    fn name(&self) -> &str;

    /// Register this extension's commands.
    fn register(&self, registrar: &ExtensionRegistrar);
}
