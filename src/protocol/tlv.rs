//! Typed fields carried by a packet.

use serde::{Deserialize, Serialize};

/// Type tag of a field inside a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlvType {
    /// Result code of a response.
    Result,
    /// Generic string value.
    String,
    /// Generic unsigned integer value.
    Uint,
    /// Generic boolean value.
    Bool,
    /// Raw bytes, e.g. an extension payload.
    Data,
    /// Name of an extension.
    ExtensionName,
}

/// Value of a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlvValue {
    String(String),
    Raw(Vec<u8>),
    Uint(u32),
    Bool(bool),
}

/// One typed field of a packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tlv {
    #[serde(rename = "type")]
    pub tlv_type: TlvType,
    pub value: TlvValue,
}

impl Tlv {
    pub fn new(tlv_type: TlvType, value: impl Into<TlvValue>) -> Self {
        Self {
            tlv_type,
            value: value.into(),
        }
    }

    /// Value as a string, if this field holds one.
    pub fn value_as_string(&self) -> Option<&str> {
        match &self.value {
            TlvValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Value as raw bytes. String values are returned as their UTF-8 bytes.
    pub fn value_as_raw(&self) -> Option<&[u8]> {
        match &self.value {
            TlvValue::Raw(bytes) => Some(bytes),
            TlvValue::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn value_as_u32(&self) -> Option<u32> {
        match self.value {
            TlvValue::Uint(v) => Some(v),
            _ => None,
        }
    }

    pub fn value_as_bool(&self) -> Option<bool> {
        match self.value {
            TlvValue::Bool(v) => Some(v),
            _ => None,
        }
    }
}

impl From<String> for TlvValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for TlvValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<Vec<u8>> for TlvValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Raw(value)
    }
}

impl From<&[u8]> for TlvValue {
    fn from(value: &[u8]) -> Self {
        Self::Raw(value.to_vec())
    }
}

impl From<u32> for TlvValue {
    fn from(value: u32) -> Self {
        Self::Uint(value)
    }
}

impl From<bool> for TlvValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors_match_value_kind() {
        let tlv = Tlv::new(TlvType::String, "bar");
        assert_eq!(tlv.value_as_string(), Some("bar"));
        assert_eq!(tlv.value_as_raw(), Some(&b"bar"[..]));
        assert_eq!(tlv.value_as_u32(), None);

        let tlv = Tlv::new(TlvType::Data, vec![1u8, 2, 3]);
        assert_eq!(tlv.value_as_string(), None);
        assert_eq!(tlv.value_as_raw(), Some(&[1u8, 2, 3][..]));

        let tlv = Tlv::new(TlvType::Bool, true);
        assert_eq!(tlv.value_as_bool(), Some(true));
    }

    #[test]
    fn test_tlv_json_shape() {
        let tlv = Tlv::new(TlvType::Uint, 250u32);
        let json = serde_json::to_value(&tlv).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "uint", "value": {"uint": 250}})
        );
    }
}
