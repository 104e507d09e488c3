use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest accepted `frame_size`.
pub const MAX_FRAME_SIZE: usize = 1 << 16;

/// Configuration shared by watermark embedding, detection and anomaly scoring.
///
/// The same configuration (and in particular the same secret key) must be
/// used for `protect` and `verify`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Secret key bytes. Never serialized.
    #[serde(skip)]
    pub secret_key: Vec<u8>,
    /// Number of payload bits carried by the watermark. Default: 32.
    pub payload_bits: usize,
    /// FFT frame size in samples. Must be a power of 2 between 4 and
    /// [`MAX_FRAME_SIZE`]. Default: 1024.
    pub frame_size: usize,
    /// Lower edge of the embedding band in Hz. Default: 300.
    pub embed_band_low_hz: f32,
    /// Upper edge of the embedding band in Hz. Default: 6000.
    pub embed_band_high_hz: f32,
    /// Relative magnitude perturbation per in-band bin. Default: 0.5.
    pub embed_strength: f32,
    /// Minimum |correlation| for a frame to count as matched. Default: 0.15.
    pub detection_threshold: f32,
    /// Fraction of analyzed frames that must match. Default: 0.5.
    pub min_frames_detected: f32,
    /// Repetition-code the payload before embedding. Default: true.
    pub error_correction: bool,
    /// Repetition factor used when `error_correction` is enabled. Default: 3.
    pub redundancy: usize,
    /// Score at or above which a signal is flagged as synthetic. Default: 0.5.
    pub anomaly_threshold: f32,
    /// Mean in-band power per sample below which a frame is treated as
    /// silent. Default: 1e-9 (-90 dBFS).
    pub noise_floor: f32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            secret_key: Vec::new(),
            payload_bits: 32,
            frame_size: 1024,
            embed_band_low_hz: 300.0,
            embed_band_high_hz: 6000.0,
            embed_strength: 0.5,
            detection_threshold: 0.15,
            min_frames_detected: 0.5,
            error_correction: true,
            redundancy: 3,
            anomaly_threshold: 0.5,
            noise_floor: 1e-9,
        }
    }
}

impl GuardConfig {
    /// Default configuration with the given secret key.
    pub fn with_key(secret_key: impl AsRef<[u8]>) -> Self {
        Self {
            secret_key: secret_key.as_ref().to_vec(),
            ..Self::default()
        }
    }

    /// Hop size for overlap-add (50% overlap).
    pub fn hop_size(&self) -> usize {
        self.frame_size / 2
    }

    /// Number of complex frequency bins (frame_size / 2 + 1).
    pub fn num_bins(&self) -> usize {
        self.frame_size / 2 + 1
    }

    /// Effective repetition factor (1 when error correction is disabled).
    pub fn effective_redundancy(&self) -> usize {
        if self.error_correction {
            self.redundancy
        } else {
            1
        }
    }

    /// Number of coded bits carried per watermark cycle.
    pub fn encoded_bits(&self) -> usize {
        self.payload_bits * self.effective_redundancy()
    }

    /// FFT bins covered by the embedding band at the given sample rate.
    ///
    /// DC and Nyquist are always excluded.
    pub fn band_bins(&self, sample_rate: u32) -> Result<Range<usize>> {
        let sr = sample_rate as f32;
        let n = self.frame_size as f32;
        let lo = ((self.embed_band_low_hz * n / sr).ceil() as usize).max(1);
        let max_bin = (self.frame_size / 2).saturating_sub(1);
        let hi = ((self.embed_band_high_hz * n / sr).floor() as usize).min(max_bin);
        if lo > hi {
            return Err(Error::InvalidConfig(format!(
                "embed band {}..{} Hz holds no FFT bins at frame size {}",
                self.embed_band_low_hz, self.embed_band_high_hz, self.frame_size
            )));
        }
        Ok(lo..hi + 1)
    }

    /// Frame size must be a power of 2 in `4..=MAX_FRAME_SIZE`.
    pub(crate) fn check_frame_size(&self) -> Result<()> {
        if !(4..=MAX_FRAME_SIZE).contains(&self.frame_size) || !self.frame_size.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "frame_size must be a power of 2 between 4 and {MAX_FRAME_SIZE}, got {}",
                self.frame_size
            )));
        }
        Ok(())
    }

    /// Check the configuration against a signal's sample rate.
    pub fn validate(&self, sample_rate: u32) -> Result<()> {
        if self.secret_key.is_empty() {
            return Err(Error::InvalidConfig("secret key is missing".into()));
        }
        if sample_rate == 0 {
            return Err(Error::InvalidConfig("sample rate must be positive".into()));
        }
        self.check_frame_size()?;
        let nyquist = sample_rate as f32 / 2.0;
        if !(self.embed_band_low_hz > 0.0
            && self.embed_band_low_hz < self.embed_band_high_hz
            && self.embed_band_high_hz < nyquist)
        {
            return Err(Error::InvalidConfig(format!(
                "embed band must satisfy 0 < low < high < {nyquist} Hz, got {}..{}",
                self.embed_band_low_hz, self.embed_band_high_hz
            )));
        }
        if !(self.embed_strength >= 0.0 && self.embed_strength.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "embed_strength must be finite and >= 0, got {}",
                self.embed_strength
            )));
        }
        if !(0.0..=1.0).contains(&self.min_frames_detected) {
            return Err(Error::InvalidConfig(format!(
                "min_frames_detected must be in [0, 1], got {}",
                self.min_frames_detected
            )));
        }
        if !(self.detection_threshold > 0.0 && self.detection_threshold <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "detection_threshold must be in (0, 1], got {}",
                self.detection_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.anomaly_threshold) {
            return Err(Error::InvalidConfig(format!(
                "anomaly_threshold must be in [0, 1], got {}",
                self.anomaly_threshold
            )));
        }
        if self.error_correction && self.redundancy == 0 {
            return Err(Error::InvalidConfig("redundancy must be at least 1".into()));
        }
        if self.noise_floor < 0.0 {
            return Err(Error::InvalidConfig("noise_floor must be >= 0".into()));
        }
        self.band_bins(sample_rate)?;

        let recommended = 2 * (sample_rate as f32 / self.embed_band_low_hz).ceil() as usize;
        if self.frame_size < recommended {
            tracing::warn!(
                frame_size = self.frame_size,
                recommended,
                "frame size is short for the lowest embed frequency"
            );
        }
        Ok(())
    }
}

impl std::fmt::Debug for GuardConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardConfig")
            .field("secret_key", &"[REDACTED]")
            .field("payload_bits", &self.payload_bits)
            .field("frame_size", &self.frame_size)
            .field("embed_band_low_hz", &self.embed_band_low_hz)
            .field("embed_band_high_hz", &self.embed_band_high_hz)
            .field("embed_strength", &self.embed_strength)
            .field("detection_threshold", &self.detection_threshold)
            .field("min_frames_detected", &self.min_frames_detected)
            .field("error_correction", &self.error_correction)
            .field("redundancy", &self.redundancy)
            .field("anomaly_threshold", &self.anomaly_threshold)
            .field("noise_floor", &self.noise_floor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid_at_16khz() {
        let config = GuardConfig::with_key("k1");
        assert!(config.validate(16000).is_ok());
    }

    #[test]
    fn missing_key_rejected() {
        let config = GuardConfig::default();
        assert!(matches!(config.validate(16000), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn band_above_nyquist_rejected() {
        // 6000 Hz default upper edge is above Nyquist at 8 kHz
        let config = GuardConfig::with_key("k1");
        assert!(config.validate(8000).is_err());
    }

    #[test]
    fn inverted_band_rejected() {
        let config = GuardConfig {
            embed_band_low_hz: 4000.0,
            embed_band_high_hz: 1000.0,
            ..GuardConfig::with_key("k1")
        };
        assert!(config.validate(16000).is_err());
    }

    #[test]
    fn frame_size_must_be_power_of_two() {
        let config = GuardConfig {
            frame_size: 1000,
            ..GuardConfig::with_key("k1")
        };
        assert!(config.validate(16000).is_err());
    }

    #[test]
    fn oversized_frame_rejected() {
        for frame_size in [MAX_FRAME_SIZE << 1, usize::MAX / 2 + 1] {
            let config = GuardConfig {
                frame_size,
                ..GuardConfig::with_key("k1")
            };
            assert!(
                matches!(config.validate(16000), Err(Error::InvalidConfig(_))),
                "frame_size {frame_size} accepted"
            );
        }
        let largest = GuardConfig {
            frame_size: MAX_FRAME_SIZE,
            ..GuardConfig::with_key("k1")
        };
        assert!(largest.validate(16000).is_ok());
    }

    #[test]
    fn band_bins_exclude_dc_and_nyquist() {
        let config = GuardConfig {
            embed_band_low_hz: 1.0,
            embed_band_high_hz: 7999.0,
            ..GuardConfig::with_key("k1")
        };
        let bins = config.band_bins(16000).unwrap();
        assert_eq!(bins.start, 1);
        assert_eq!(bins.end, 512);
    }

    #[test]
    fn band_bins_default_16khz() {
        let config = GuardConfig::with_key("k1");
        // 300 Hz * 1024 / 16000 = 19.2 -> 20; 6000 * 1024 / 16000 = 384
        assert_eq!(config.band_bins(16000).unwrap(), 20..385);
    }

    #[test]
    fn redundancy_disabled_without_error_correction() {
        let config = GuardConfig {
            error_correction: false,
            ..GuardConfig::with_key("k1")
        };
        assert_eq!(config.effective_redundancy(), 1);
        assert_eq!(config.encoded_bits(), 32);
    }

    #[test]
    fn debug_redacts_key() {
        let config = GuardConfig::with_key("super-secret");
        let text = format!("{config:?}");
        assert!(!text.contains("super-secret"));
    }
}
