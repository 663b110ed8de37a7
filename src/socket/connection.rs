//! Per-connection handler.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tracing::{debug, error, info, warn};

use crate::commands::Dispatcher;
use crate::config::Settings;
use crate::error::{AgentError, ProtocolErrorKind};
use crate::protocol::{FrameCodec, Packet, PacketResult, PacketType};

use super::ConnectionMetrics;

/// Handle a single client connection.
///
/// Requests on one connection are served in order until the peer hangs up
/// or the stream stops carrying packets.
pub async fn handle_connection(
    stream: UnixStream,
    settings: Arc<Settings>,
    dispatcher: Dispatcher,
    metrics: Arc<ConnectionMetrics>,
) -> Result<(), AgentError> {
    let codec = FrameCodec::new(
        settings.limits.max_message_size,
        Duration::from_secs(settings.limits.socket_timeout_seconds),
    );
    let (mut reader, mut writer) = stream.into_split();

    loop {
        match serve_one(&codec, &mut reader, &mut writer, &dispatcher, &metrics).await {
            Ok(()) => {}
            Err(AgentError::Protocol {
                kind: ProtocolErrorKind::ConnectionClosed,
            }) => {
                debug!("Client disconnected");
                return Ok(());
            }
            Err(AgentError::Protocol {
                kind: ProtocolErrorKind::ConnectionTimeout,
            }) => {
                warn!("Connection idle past timeout, closing");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }
}

/// Read one packet, execute it and write the response.
async fn serve_one<R, W>(
    codec: &FrameCodec,
    reader: &mut R,
    writer: &mut W,
    dispatcher: &Dispatcher,
    metrics: &ConnectionMetrics,
) -> Result<(), AgentError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let request = codec.read_packet(reader).await?;

    let started = Instant::now();
    info!(
        request_id = %request.request_id,
        command = %request.method,
        "Received request"
    );

    let response = execute(dispatcher, request).await;
    let result = response.result();
    metrics.record_request(matches!(result, None | Some(PacketResult::Success)));

    debug!(
        request_id = %response.request_id,
        command = %response.method,
        result = ?result,
        duration_ms = started.elapsed().as_millis() as u64,
        "Request completed"
    );

    codec.write_packet(writer, &response).await
}

/// Run a request through the dispatcher and turn any error into a failed
/// response correlated with the request.
///
/// Handlers that advertise themselves as blocking run on the blocking pool.
pub async fn execute(dispatcher: &Dispatcher, request: Packet) -> Packet {
    if request.packet_type != PacketType::Request {
        warn!(
            request_id = %request.request_id,
            command = %request.method,
            "Ignoring packet that is not a request"
        );
        return request.create_result_response(PacketResult::InvalidData);
    }

    let blocking = dispatcher.is_blocking(&request.method).unwrap_or(false);
    let (request, result) = if blocking {
        let fallback = request.create_response();
        let dispatcher = dispatcher.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let result = dispatcher.dispatch(&request);
            (request, result)
        })
        .await;

        match joined {
            Ok(pair) => pair,
            Err(e) => {
                error!(error = %e, "Command task panicked");
                return fallback.with_result(PacketResult::GeneralFailure);
            }
        }
    } else {
        let result = dispatcher.dispatch(&request);
        (request, result)
    };

    match result {
        Ok(response) => response,
        Err(e) => {
            warn!(
                request_id = %request.request_id,
                command = %request.method,
                error = %e,
                "Command failed"
            );
            request.create_result_response(e.result_code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::ExtensionCatalog;
    use crate::protocol::TlvType;

    fn test_dispatcher() -> Dispatcher {
        Dispatcher::with_catalog(ExtensionCatalog::bundled())
    }

    #[tokio::test]
    async fn test_execute_unknown_command() {
        let dispatcher = test_dispatcher();
        let request = Packet::request("stdapi_fs_ls");
        let response = execute(&dispatcher, request.clone()).await;

        assert_eq!(response.request_id, request.request_id);
        assert_eq!(response.result(), Some(PacketResult::CallNotImplemented));
    }

    #[tokio::test]
    async fn test_execute_blocking_handler() {
        let dispatcher = test_dispatcher();
        dispatcher
            .registry()
            .register("bar", "slow", true, |request: &Packet| {
                Ok(request.create_result_response(PacketResult::Success))
            });

        let request = Packet::request("slow");
        let response = execute(&dispatcher, request.clone()).await;
        assert_eq!(response.request_id, request.request_id);
        assert_eq!(response.result(), Some(PacketResult::Success));
    }

    #[tokio::test]
    async fn test_execute_rejects_responses() {
        let dispatcher = test_dispatcher();
        let packet = Packet::request("core_enumextcmd")
            .with(TlvType::String, "")
            .create_response();

        let response = execute(&dispatcher, packet).await;
        assert_eq!(response.result(), Some(PacketResult::InvalidData));
    }

    #[tokio::test]
    async fn test_execute_panicking_blocking_handler() {
        let dispatcher = test_dispatcher();
        dispatcher
            .registry()
            .register("bar", "explode", true, |_request: &Packet| panic!("boom"));

        let request = Packet::request("explode");
        let response = execute(&dispatcher, request.clone()).await;
        assert_eq!(response.request_id, request.request_id);
        assert_eq!(response.result(), Some(PacketResult::GeneralFailure));
    }
}
