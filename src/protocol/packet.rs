//! Decoded request/response packets.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tlv::{Tlv, TlvType, TlvValue};

/// Direction of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketType {
    Request,
    Response,
}

/// Result codes carried in the `Result` field of a response.
///
/// Values follow the Windows system error code space used by the agent's peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PacketResult {
    Success = 0,
    InvalidFunction = 1,
    BadFormat = 11,
    InvalidData = 13,
    GeneralFailure = 31,
    InvalidParameter = 87,
    CallNotImplemented = 120,
}

impl PacketResult {
    /// Numeric code as written on the wire.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Map a numeric code back to a known result.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::InvalidFunction),
            11 => Some(Self::BadFormat),
            13 => Some(Self::InvalidData),
            31 => Some(Self::GeneralFailure),
            87 => Some(Self::InvalidParameter),
            120 => Some(Self::CallNotImplemented),
            _ => None,
        }
    }
}

/// A decoded message exchanged with the peer.
///
/// The method names the command to run; the request id correlates a response
/// with the request that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub packet_type: PacketType,
    pub method: String,
    pub request_id: String,
    #[serde(default)]
    pub tlvs: Vec<Tlv>,
}

impl Packet {
    /// Create a new request for `method` with a fresh request id.
    pub fn request(method: impl Into<String>) -> Self {
        Self {
            packet_type: PacketType::Request,
            method: method.into(),
            request_id: Uuid::new_v4().to_string(),
            tlvs: Vec::new(),
        }
    }

    /// Create an empty response correlated with this request.
    pub fn create_response(&self) -> Self {
        Self {
            packet_type: PacketType::Response,
            method: self.method.clone(),
            request_id: self.request_id.clone(),
            tlvs: Vec::new(),
        }
    }

    /// Create a response carrying only a result code.
    pub fn create_result_response(&self, result: PacketResult) -> Self {
        self.create_response().with_result(result)
    }

    /// Append a typed field.
    pub fn add(&mut self, tlv_type: TlvType, value: impl Into<TlvValue>) -> &mut Self {
        self.tlvs.push(Tlv::new(tlv_type, value));
        self
    }

    /// Append a typed field (builder form).
    pub fn with(mut self, tlv_type: TlvType, value: impl Into<TlvValue>) -> Self {
        self.add(tlv_type, value);
        self
    }

    /// Append a result code.
    pub fn add_result(&mut self, result: PacketResult) -> &mut Self {
        self.add(TlvType::Result, result.code())
    }

    /// Append a result code (builder form).
    pub fn with_result(mut self, result: PacketResult) -> Self {
        self.add_result(result);
        self
    }

    /// All fields of the given type, in order.
    pub fn tlvs(&self, tlv_type: TlvType) -> impl Iterator<Item = &Tlv> {
        self.tlvs.iter().filter(move |t| t.tlv_type == tlv_type)
    }

    /// First field of the given type read as a string.
    pub fn first_string(&self, tlv_type: TlvType) -> Option<&str> {
        self.tlvs(tlv_type).find_map(Tlv::value_as_string)
    }

    /// First field of the given type read as raw bytes.
    pub fn first_raw(&self, tlv_type: TlvType) -> Option<&[u8]> {
        self.tlvs(tlv_type).find_map(Tlv::value_as_raw)
    }

    /// First field of the given type read as an unsigned integer.
    pub fn first_u32(&self, tlv_type: TlvType) -> Option<u32> {
        self.tlvs(tlv_type).find_map(Tlv::value_as_u32)
    }

    /// Every string field of the given type, in order.
    pub fn strings(&self, tlv_type: TlvType) -> Vec<&str> {
        self.tlvs(tlv_type).filter_map(Tlv::value_as_string).collect()
    }

    /// Result code of a response, if present and recognised.
    pub fn result(&self) -> Option<PacketResult> {
        self.first_u32(TlvType::Result)
            .and_then(PacketResult::from_code)
    }
}
