pub mod anomaly;
pub mod codec;
pub mod config;
pub mod detect;
pub mod embed;
pub mod error;
pub mod fft;
pub mod fingerprint;
pub mod frame;
pub mod key;
pub mod payload;
pub mod signal;
pub mod spread;
pub mod verdict;

#[cfg(feature = "parallel")]
pub mod parallel;

// Re-export primary API types
pub use anomaly::{AnomalyReport, SpectralFeatures};
pub use codec::{ErrorCorrection, Repetition};
pub use config::GuardConfig;
pub use detect::WatermarkReport;
pub use error::Error;
pub use fingerprint::{FingerprintMatch, VoiceFingerprint};
pub use key::WatermarkKey;
pub use payload::Payload;
pub use signal::Signal;
pub use verdict::{DetectionReport, RiskLevel, Verdict};

#[cfg(feature = "parallel")]
pub use parallel::{protect_parallel, verify_parallel};

/// Embed a keyed watermark carrying `payload` and return the protected copy.
///
/// Fails with `InvalidConfig`, `EmptySignal`, `InvalidPayloadLength` or
/// `InsufficientCapacity`; nothing is embedded on failure.
pub fn protect(signal: &Signal, config: &GuardConfig, payload: &Payload) -> error::Result<Signal> {
    embed::protect(signal, config, payload)
}

/// Check a signal for this key's watermark and for synthesis artifacts.
///
/// Only an invalid configuration or an empty signal is an error. Silent,
/// truncated or foreign audio produces a report with low confidence and a
/// `Suspect` verdict instead.
pub fn verify(signal: &Signal, config: &GuardConfig) -> error::Result<DetectionReport> {
    let watermark = detect::verify_watermark(signal, config)?;
    let anomaly = anomaly::score_anomaly(signal, config)?;
    let report = DetectionReport::new(watermark, anomaly);
    tracing::info!(
        verdict = %report.verdict,
        confidence = report.confidence,
        anomaly_score = report.anomaly_score,
        "verification finished"
    );
    Ok(report)
}

/// Watermark detection only.
pub fn verify_watermark(signal: &Signal, config: &GuardConfig) -> error::Result<WatermarkReport> {
    detect::verify_watermark(signal, config)
}

/// Anomaly scoring only. Needs no secret key.
pub fn score_anomaly(signal: &Signal, config: &GuardConfig) -> error::Result<AnomalyReport> {
    anomaly::score_anomaly(signal, config)
}
