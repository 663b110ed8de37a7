//! Built-in commands: extension enumeration and extension loading.

use std::sync::{Arc, Weak};

use tracing::{info, warn};

use crate::error::{AgentError, AgentResult, ExtensionErrorKind};
use crate::extensions::{ExtensionLoader, LoadOutcome};
use crate::protocol::{Packet, PacketResult, TlvType};

use super::registry::CommandRegistry;
use super::traits::CommandHandler;

/// Lists the commands of one extension.
pub const CORE_ENUMEXTCMD: &str = "core_enumextcmd";

/// Loads an extension from a payload.
pub const CORE_LOADLIB: &str = "core_loadlib";

/// Install the built-in commands into a registry under construction.
///
/// The handlers hold a weak reference so the registry does not own itself.
pub(super) fn register_builtins(
    registry: &CommandRegistry,
    this: Weak<CommandRegistry>,
    loader: Arc<ExtensionLoader>,
) {
    registry.register_handler(
        "",
        CORE_ENUMEXTCMD,
        false,
        Arc::new(EnumExtCmdCommand {
            registry: this.clone(),
        }),
    );
    registry.register_handler(
        "",
        CORE_LOADLIB,
        false,
        Arc::new(LoadLibCommand {
            registry: this,
            loader,
        }),
    );
}

fn upgrade(registry: &Weak<CommandRegistry>) -> AgentResult<Arc<CommandRegistry>> {
    registry.upgrade().ok_or(AgentError::Extension {
        kind: ExtensionErrorKind::RegistryUnavailable,
    })
}

/// `core_enumextcmd`: the request's first `String` field names the extension;
/// the response lists its commands as repeated `String` fields.
struct EnumExtCmdCommand {
    registry: Weak<CommandRegistry>,
}

impl CommandHandler for EnumExtCmdCommand {
    fn handle(&self, request: &Packet) -> AgentResult<Packet> {
        let registry = upgrade(&self.registry)?;
        let extension = request
            .first_string(TlvType::String)
            .ok_or_else(|| AgentError::missing_tlv(TlvType::String))?;

        let mut response = request.create_response();
        for command in registry.commands_for_extension(extension) {
            response.add(TlvType::String, command);
        }
        response.add_result(PacketResult::Success);

        Ok(response)
    }
}

/// `core_loadlib`: the request's first `Data` field is the extension payload.
struct LoadLibCommand {
    registry: Weak<CommandRegistry>,
    loader: Arc<ExtensionLoader>,
}

impl CommandHandler for LoadLibCommand {
    fn handle(&self, request: &Packet) -> AgentResult<Packet> {
        let registry = upgrade(&self.registry)?;
        let payload = request
            .first_raw(TlvType::Data)
            .ok_or_else(|| AgentError::missing_tlv(TlvType::Data))?;

        let mut response = request.create_response();
        match self.loader.load_extension(&registry, payload)? {
            LoadOutcome::Loaded {
                module,
                extension,
                commands,
            } => {
                info!(
                    module = %module,
                    extension = %extension,
                    commands = commands.len(),
                    "Extension loaded"
                );
                response.add(TlvType::ExtensionName, extension);
                for command in commands {
                    response.add(TlvType::String, command);
                }
                response.add_result(PacketResult::Success);
            }
            LoadOutcome::Rejected(reason) => {
                warn!(reason = %reason, "Extension payload rejected");
                response.add_result(PacketResult::InvalidData);
            }
        }

        Ok(response)
    }
}
