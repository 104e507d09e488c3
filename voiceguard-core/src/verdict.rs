use serde::Serialize;

use crate::anomaly::{AnomalyReport, SpectralFeatures};
use crate::detect::WatermarkReport;
use crate::payload::Payload;

/// Final classification of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// Watermark present, no synthesis artifacts.
    Authentic,
    /// Neither proof of origin nor evidence of synthesis.
    Suspect,
    /// Synthesis artifacts, whatever the watermark says.
    Deepfake,
}

impl Verdict {
    /// Anomalies dominate: a cloned copy of watermarked audio can still
    /// carry the watermark.
    pub fn fuse(watermark_detected: bool, anomaly_detected: bool) -> Self {
        match (watermark_detected, anomaly_detected) {
            (_, true) => Verdict::Deepfake,
            (true, false) => Verdict::Authentic,
            (false, false) => Verdict::Suspect,
        }
    }

    pub fn risk(self) -> RiskLevel {
        match self {
            Verdict::Authentic => RiskLevel::Low,
            Verdict::Suspect => RiskLevel::Medium,
            Verdict::Deepfake => RiskLevel::High,
        }
    }

    /// Human-readable description.
    pub fn label(self) -> &'static str {
        match self {
            Verdict::Authentic => "Original protected audio",
            Verdict::Suspect => "Unverified audio of unknown origin",
            Verdict::Deepfake => "Possible deepfake or tampered audio",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Verdict::Authentic => "AUTHENTIC",
            Verdict::Suspect => "SUSPECT",
            Verdict::Deepfake => "DEEPFAKE",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        })
    }
}

/// Everything `verify` learned about a signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionReport {
    pub watermark_detected: bool,
    pub confidence: f32,
    pub frames_analyzed: usize,
    pub frames_matched: usize,
    pub payload: Option<Payload>,
    pub anomaly_detected: bool,
    pub anomaly_score: f32,
    pub features: SpectralFeatures,
    pub verdict: Verdict,
    pub risk: RiskLevel,
    pub label: &'static str,
}

impl DetectionReport {
    pub fn new(watermark: WatermarkReport, anomaly: AnomalyReport) -> Self {
        let verdict = Verdict::fuse(watermark.watermark_detected, anomaly.anomaly_detected);
        Self {
            watermark_detected: watermark.watermark_detected,
            confidence: watermark.confidence,
            frames_analyzed: watermark.frames_analyzed,
            frames_matched: watermark.frames_matched,
            payload: watermark.payload,
            anomaly_detected: anomaly.anomaly_detected,
            anomaly_score: anomaly.score,
            features: anomaly.features,
            verdict,
            risk: verdict.risk(),
            label: verdict.label(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fusion_table() {
        assert_eq!(Verdict::fuse(true, false), Verdict::Authentic);
        assert_eq!(Verdict::fuse(false, false), Verdict::Suspect);
        assert_eq!(Verdict::fuse(true, true), Verdict::Deepfake);
        assert_eq!(Verdict::fuse(false, true), Verdict::Deepfake);
    }

    #[test]
    fn risk_follows_verdict() {
        assert_eq!(Verdict::Authentic.risk(), RiskLevel::Low);
        assert_eq!(Verdict::Suspect.risk(), RiskLevel::Medium);
        assert_eq!(Verdict::Deepfake.risk(), RiskLevel::High);
        assert!(RiskLevel::Low < RiskLevel::High);
    }

    #[test]
    fn display_is_upper_case() {
        assert_eq!(Verdict::Deepfake.to_string(), "DEEPFAKE");
        assert_eq!(RiskLevel::Medium.to_string(), "medium");
    }

    #[test]
    fn report_carries_both_halves() {
        let watermark = WatermarkReport {
            watermark_detected: true,
            confidence: 0.9,
            frames_analyzed: 10,
            frames_matched: 9,
            mean_correlation: 0.3,
            payload: Some(Payload::from_bytes(&[0xAB])),
            corrected_bits: 0,
            uncorrectable_bits: 0,
        };
        let anomaly = AnomalyReport {
            anomaly_detected: false,
            score: 0.42,
            features: SpectralFeatures::default(),
            frames_analyzed: 10,
        };
        let report = DetectionReport::new(watermark, anomaly);
        assert_eq!(report.verdict, Verdict::Authentic);
        assert_eq!(report.risk, RiskLevel::Low);
        assert_eq!(report.frames_matched, 9);
        assert_eq!(report.payload.map(|p| p.to_hex()), Some("ab".to_string()));
    }
}
