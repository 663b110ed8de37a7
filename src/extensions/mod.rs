//! Runtime extensions.
//!
//! An extension arrives as a payload in a `core_loadlib` request. The
//! [`ExtensionLoader`] loads it as a [`Module`], picks the single exported
//! type implementing [`Capability::Extension`], instantiates it and calls
//! [`Extension::register`] with an [`ExtensionRegistrar`], the only registry
//! access an extension ever gets.

mod echo;
mod loader;
mod manifest;
mod module;
mod registrar;
mod traits;

pub use echo::EchoExtension;
pub use loader::{ExtensionLoader, LoadOutcome, RejectReason};
pub use manifest::{ExtensionCatalog, ManifestModuleLoader};
pub use module::{
    find_types_implementing, ExportedType, ExtensionFactory, LoadError, Module, ModuleLoader,
};
pub use registrar::ExtensionRegistrar;
pub use traits::{Capability, Extension};
