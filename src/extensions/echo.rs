//! Echo extension: a minimal bundled extension for checking that runtime
//! loading works end to end.

use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::error::AgentResult;
use crate::protocol::{Packet, PacketResult, TlvType};

use super::registrar::ExtensionRegistrar;
use super::traits::Extension;

/// Upper bound for `echo_sleep`.
const MAX_SLEEP_MS: u32 = 10_000;

/// Registers `echo_echo` and `echo_sleep` under the `echo` extension.
#[derive(Debug, Default)]
pub struct EchoExtension;

impl EchoExtension {
    /// Catalog type name manifests refer to.
    pub const TYPE_NAME: &'static str = "echo";
}

impl Extension for EchoExtension {
    fn name(&self) -> &str {
        "echo"
    }

    fn register(&self, registrar: &ExtensionRegistrar) {
        debug!(extension = registrar.extension_name(), "Registering echo commands");
        registrar.register("echo_echo", false, echo);
        registrar.register("echo_sleep", true, sleep);
    }
}

/// Copy every string field of the request into the response.
fn echo(request: &Packet) -> AgentResult<Packet> {
    let mut response = request.create_response();
    for value in request.strings(TlvType::String) {
        response.add(TlvType::String, value);
    }
    response.add_result(PacketResult::Success);
    Ok(response)
}

/// Sleep for the requested number of milliseconds.
fn sleep(request: &Packet) -> AgentResult<Packet> {
    let millis = request.first_u32(TlvType::Uint).unwrap_or(0).min(MAX_SLEEP_MS);
    thread::sleep(Duration::from_millis(u64::from(millis)));

    let mut response = request.create_response();
    response
        .add(TlvType::Uint, millis)
        .add_result(PacketResult::Success);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::commands::CommandRegistry;

    #[test]
    fn test_echo_name() {
        assert_eq!(EchoExtension.name(), "echo");
    }

    #[test]
    fn test_echo_registers_commands() {
        let registry = Arc::new(CommandRegistry::empty());
        let registrar = ExtensionRegistrar::new(&registry, EchoExtension.name());
        EchoExtension.register(&registrar);

        assert_eq!(
            registry.commands_for_extension("echo"),
            vec!["echo_echo", "echo_sleep"]
        );
        assert!(!registry.get("echo_echo").unwrap().blocking);
        assert!(registry.get("echo_sleep").unwrap().blocking);
    }

    #[test]
    fn test_echo_execute() {
        let request = Packet::request("echo_echo")
            .with(TlvType::String, "hello")
            .with(TlvType::Uint, 5u32)
            .with(TlvType::String, "world");

        let response = echo(&request).unwrap();
        assert_eq!(response.strings(TlvType::String), vec!["hello", "world"]);
        assert_eq!(response.result(), Some(PacketResult::Success));
    }

    #[test]
    fn test_sleep_reports_duration() {
        let request = Packet::request("echo_sleep").with(TlvType::Uint, 1u32);
        let response = sleep(&request).unwrap();
        assert_eq!(response.first_u32(TlvType::Uint), Some(1));
        assert_eq!(response.result(), Some(PacketResult::Success));
    }
}
