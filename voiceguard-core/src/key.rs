use aes::Aes128;
use aes::cipher::{BlockEncrypt, KeyInit};

use crate::error::{Error, Result};

/// Domain tag mixed into every carrier block.
const CARRIER_TAG: [u8; 4] = *b"CARR";

/// The shared secret that gates embedding and detection.
///
/// Wraps an AES-128 cipher used in counter mode as a PRNG: the carrier for a
/// frame is the keystream for `(frame_index, counter)` blocks, one sign per
/// bit.
#[derive(Clone)]
pub struct WatermarkKey {
    cipher: Aes128,
    raw: [u8; 16],
}

impl WatermarkKey {
    /// Create a key from exactly 16 raw bytes.
    pub fn new(key_bytes: &[u8]) -> Result<Self> {
        let raw: [u8; 16] = key_bytes.try_into().map_err(|_| {
            Error::InvalidConfig(format!(
                "raw key must be 16 bytes, got {}",
                key_bytes.len()
            ))
        })?;
        Ok(Self::from_raw(raw))
    }

    /// Derive a key from an arbitrary non-empty secret.
    ///
    /// The secret bytes are folded into 16 bytes and then passed through AES
    /// once so that secrets differing in a single byte yield unrelated keys.
    pub fn derive(secret: &[u8]) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::InvalidConfig("secret key is missing".into()));
        }
        let mut folded = [0u8; 16];
        for (i, &b) in secret.iter().enumerate() {
            folded[i % 16] ^= b;
            folded[(i + 7) % 16] = folded[(i + 7) % 16].wrapping_add(b.wrapping_mul(0x9E));
        }
        // Length is mixed in so that "a" and "a\0" differ.
        for (i, b) in (secret.len() as u64).to_le_bytes().iter().enumerate() {
            folded[8 + i] ^= b;
        }
        let cipher = Aes128::new(&folded.into());
        let mut block = aes::Block::from(folded);
        cipher.encrypt_block(&mut block);
        Ok(Self::from_raw(block.into()))
    }

    fn from_raw(raw: [u8; 16]) -> Self {
        Self {
            cipher: Aes128::new(&raw.into()),
            raw,
        }
    }

    /// Returns the raw 16-byte key.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.raw
    }

    /// Generate the ±1 spread-spectrum carrier for a frame.
    ///
    /// Deterministic in `(key, frame_index, num_bins)`; a longer carrier for
    /// the same frame extends a shorter one.
    pub fn carrier(&self, frame_index: u64, num_bins: usize) -> Result<Vec<f32>> {
        if num_bins == 0 {
            return Err(Error::InvalidConfig(
                "carrier needs at least one frequency bin".into(),
            ));
        }

        let mut carrier = Vec::with_capacity(num_bins);
        let mut counter: u32 = 0;
        while carrier.len() < num_bins {
            // [frame_index(8) | counter(4) | tag(4)]
            let mut input = [0u8; 16];
            input[0..8].copy_from_slice(&frame_index.to_le_bytes());
            input[8..12].copy_from_slice(&counter.to_le_bytes());
            input[12..16].copy_from_slice(&CARRIER_TAG);

            let mut block = aes::Block::from(input);
            self.cipher.encrypt_block(&mut block);
            let output: [u8; 16] = block.into();

            'block: for byte in output {
                for j in (0..8).rev() {
                    if carrier.len() >= num_bins {
                        break 'block;
                    }
                    carrier.push(if (byte >> j) & 1 == 1 { 1.0 } else { -1.0 });
                }
            }
            counter += 1;
        }

        Ok(carrier)
    }
}

impl std::fmt::Debug for WatermarkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatermarkKey")
            .field("raw", &"[REDACTED]")
            .finish()
    }
}

/// Generate the carrier for `(secret_key, frame_index)` in one call.
pub fn carrier(secret_key: &[u8], frame_index: u64, num_bins: usize) -> Result<Vec<f32>> {
    WatermarkKey::derive(secret_key)?.carrier(frame_index, num_bins)
}
