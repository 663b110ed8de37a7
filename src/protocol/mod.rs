//! Packet model and wire framing.
//!
//! The dispatch core consumes and produces decoded [`Packet`]s. The socket
//! host frames them on the wire as length-prefixed JSON:
//! ```text
//! [4 bytes: length (big-endian u32)][JSON packet]
//! ```

mod packet;
mod tlv;
mod wire;

pub use packet::{Packet, PacketResult, PacketType};
pub use tlv::{Tlv, TlvType, TlvValue};
pub use wire::{read_frame, write_frame, FrameCodec, DEFAULT_MAX_MESSAGE_SIZE};
