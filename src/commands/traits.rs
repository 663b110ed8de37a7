//! Command handler trait definition.

use crate::error::AgentResult;
use crate::protocol::Packet;

/// A function from one request packet to one response packet.
///
/// Built-in commands implement this on a struct; extensions usually register
/// closures, which implement it through the blanket impl below.
///
/// # Example
///
/// ```ignore
/// registry.register("", "core_ping", false, |request: &Packet| {
///     Ok(request.create_result_response(PacketResult::Success))
/// });
/// ```
pub trait CommandHandler: Send + Sync {
    /// Handle a request.
    ///
    /// `Ok` means the request was handled; the response may still carry a
    /// failing result code, which the dispatcher passes through untouched.
    /// `Err` is reported to the peer by the host as a failed response.
    ///
    /// Note: This may be called from a blocking context via `spawn_blocking`.
    fn handle(&self, request: &Packet) -> AgentResult<Packet>;
}

impl<F> CommandHandler for F
where
    F: Fn(&Packet) -> AgentResult<Packet> + Send + Sync,
{
    fn handle(&self, request: &Packet) -> AgentResult<Packet> {
        self(request)
    }
}
