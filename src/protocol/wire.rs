//! Packet framing on a byte stream.
//!
//! Each packet travels as `[u32 big-endian length][JSON packet]`.

use std::io::ErrorKind;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::error::{AgentError, AgentResult, ProtocolErrorKind};

use super::packet::Packet;

/// Default maximum frame size. Extension payloads travel inline, so this is
/// well above what ordinary command traffic needs.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1_048_576;

const LENGTH_PREFIX: usize = 4;

fn too_large(size: usize, max: usize) -> AgentError {
    AgentError::Protocol {
        kind: ProtocolErrorKind::MessageTooLarge { size, max },
    }
}

/// Read one frame body. A stream that ends before the length prefix is
/// complete is reported as `ConnectionClosed`.
pub async fn read_frame<R>(reader: &mut R, max_size: usize) -> AgentResult<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX];
    if let Err(e) = reader.read_exact(&mut prefix).await {
        return Err(match e.kind() {
            ErrorKind::UnexpectedEof => AgentError::Protocol {
                kind: ProtocolErrorKind::ConnectionClosed,
            },
            _ => e.into(),
        });
    }

    let size = u32::from_be_bytes(prefix) as usize;
    if size > max_size {
        return Err(too_large(size, max_size));
    }

    let mut body = vec![0u8; size];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

/// Write one frame and flush it.
pub async fn write_frame<W>(writer: &mut W, body: &[u8]) -> AgentResult<()>
where
    W: AsyncWrite + Unpin,
{
    let size = u32::try_from(body.len()).map_err(|_| too_large(body.len(), u32::MAX as usize))?;

    writer.write_all(&size.to_be_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

/// Frame limits of one connection: maximum body size and per-operation
/// timeout.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_size: usize,
    io_timeout: Duration,
}

impl FrameCodec {
    pub fn new(max_size: usize, io_timeout: Duration) -> Self {
        Self {
            max_size,
            io_timeout,
        }
    }

    /// Read and decode the next packet.
    ///
    /// A body that is not a packet is `InvalidMessageFormat`; it carries no
    /// request id, so nothing can be answered.
    pub async fn read_packet<R>(&self, reader: &mut R) -> AgentResult<Packet>
    where
        R: AsyncRead + Unpin,
    {
        let body = timeout(self.io_timeout, read_frame(reader, self.max_size))
            .await
            .map_err(|_| AgentError::Protocol {
                kind: ProtocolErrorKind::ConnectionTimeout,
            })??;

        serde_json::from_slice(&body).map_err(|e| AgentError::Protocol {
            kind: ProtocolErrorKind::InvalidMessageFormat {
                message: format!("Invalid JSON: {}", e),
            },
        })
    }

    /// Encode and write a packet.
    pub async fn write_packet<W>(&self, writer: &mut W, packet: &Packet) -> AgentResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        let body = serde_json::to_vec(packet)?;
        if body.len() > self.max_size {
            return Err(too_large(body.len(), self.max_size));
        }

        timeout(self.io_timeout, write_frame(writer, &body))
            .await
            .map_err(|_| AgentError::Protocol {
                kind: ProtocolErrorKind::ConnectionTimeout,
            })?
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_SIZE, Duration::from_secs(30))
    }
}
