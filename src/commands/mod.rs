//! Command registry and dispatch.
//!
//! ## Adding a Command
//!
//! Built-in commands implement [`CommandHandler`] and are installed by
//! `builtin::register_builtins`. Everything else arrives at runtime through
//! `core_loadlib`, which hands an extension an
//! [`ExtensionRegistrar`](crate::extensions::ExtensionRegistrar).

mod builtin;
mod dispatcher;
mod registry;
mod traits;
mod types;

pub use builtin::{CORE_ENUMEXTCMD, CORE_LOADLIB};
pub use dispatcher::Dispatcher;
pub use registry::CommandRegistry;
pub use traits::CommandHandler;
pub use types::HandlerEntry;
