use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// Metadata carried by the watermark: a bounded bit sequence.
///
/// Bits are ordered MSB first when built from bytes or hex. A payload shorter
/// than the configured bit count is zero-padded before embedding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Payload {
    bits: Vec<bool>,
}

impl Payload {
    /// An empty payload. The watermark still carries its presence signature.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_bits(bits: impl Into<Vec<bool>>) -> Self {
        Self { bits: bits.into() }
    }

    /// Create a payload from bytes (MSB first).
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let bits = bytes
            .iter()
            .flat_map(|byte| (0..8).rev().map(move |j| (byte >> j) & 1 == 1))
            .collect();
        Self { bits }
    }

    /// Create a payload from a hex string (whitespace trimmed, even length).
    pub fn from_hex(hex: &str) -> Result<Self> {
        let hex = hex.trim();
        if hex.len() % 2 != 0 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidHex(hex.to_string()));
        }
        let bytes = (0..hex.len())
            .step_by(2)
            .map(|i| {
                u8::from_str_radix(&hex[i..i + 2], 16)
                    .map_err(|_| Error::InvalidHex(hex.to_string()))
            })
            .collect::<Result<Vec<u8>>>()?;
        Ok(Self::from_bytes(&bytes))
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Pack the bits into bytes (MSB first, last byte zero-filled).
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bits
            .chunks(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u8, |acc, (j, &b)| acc | ((b as u8) << (7 - j)))
            })
            .collect()
    }

    /// Convert to a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.to_bytes().iter().map(|b| format!("{b:02x}")).collect()
    }

    /// The bits zero-padded to exactly `len`.
    ///
    /// Fails with `InvalidPayloadLength` if the payload is longer than `len`.
    pub fn padded_bits(&self, len: usize) -> Result<Vec<bool>> {
        if self.bits.len() > len {
            return Err(Error::InvalidPayloadLength {
                max: len,
                got: self.bits.len(),
            });
        }
        let mut bits = self.bits.clone();
        bits.resize(len, false);
        Ok(bits)
    }
}

impl From<Vec<bool>> for Payload {
    fn from(bits: Vec<bool>) -> Self {
        Self { bits }
    }
}

/// Serialized as its hex string.
impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl std::fmt::Display for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}
