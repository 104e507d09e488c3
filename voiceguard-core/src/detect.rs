use std::ops::Range;

use serde::Serialize;

use crate::codec::{ErrorCorrection, Repetition, Symbol};
use crate::config::GuardConfig;
use crate::error::{Error, Result};
use crate::fft::FftProcessor;
use crate::frame::{FrameMode, FrameSpan, Framer, sqrt_hann_window, window_energy};
use crate::key::WatermarkKey;
use crate::payload::Payload;
use crate::signal::Signal;
use crate::spread;

/// Outcome of watermark detection over a whole signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatermarkReport {
    pub watermark_detected: bool,
    /// `frames_matched / frames_analyzed`, 0 when nothing was analyzed.
    pub confidence: f32,
    /// Frames above the noise floor.
    pub frames_analyzed: usize,
    /// Analyzed frames whose |correlation| reached the detection threshold.
    pub frames_matched: usize,
    /// Mean |correlation| over analyzed frames.
    pub mean_correlation: f32,
    /// Decoded payload, only reported when the watermark was detected.
    pub payload: Option<Payload>,
    /// Coded bits overruled by their redundancy group.
    pub corrected_bits: usize,
    /// Payload bits whose value could not be established.
    pub uncorrectable_bits: usize,
}

impl WatermarkReport {
    fn empty() -> Self {
        Self {
            watermark_detected: false,
            confidence: 0.0,
            frames_analyzed: 0,
            frames_matched: 0,
            mean_correlation: 0.0,
            payload: None,
            corrected_bits: 0,
            uncorrectable_bits: 0,
        }
    }
}

/// What one detection frame contributed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum FrameReading {
    /// Below the noise floor or not finite; excluded from every count.
    Skipped,
    /// Correlation against the frame's expected carrier.
    Measured(f32),
}

/// Per-call detection state shared by every frame.
pub(crate) struct DetectPlan {
    pub key: WatermarkKey,
    pub window: Vec<f32>,
    window_energy: f32,
    pub band: Range<usize>,
    pub frame_size: usize,
    threshold: f32,
    min_fraction: f32,
    noise_floor: f32,
    payload_bits: usize,
    redundancy: usize,
}

impl DetectPlan {
    pub fn new(signal: &Signal, config: &GuardConfig) -> Result<Self> {
        config.validate(signal.sample_rate())?;
        if signal.is_empty() {
            return Err(Error::EmptySignal);
        }
        let window = sqrt_hann_window(config.frame_size);
        Ok(Self {
            key: WatermarkKey::derive(&config.secret_key)?,
            window_energy: window_energy(&window),
            window,
            band: config.band_bins(signal.sample_rate())?,
            frame_size: config.frame_size,
            threshold: config.detection_threshold,
            min_fraction: config.min_frames_detected,
            noise_floor: config.noise_floor,
            payload_bits: config.payload_bits,
            redundancy: config.effective_redundancy(),
        })
    }

    pub fn framer(&self, signal_len: usize) -> Framer {
        Framer::new(self.frame_size, signal_len, FrameMode::Drop)
    }

    /// Analyze one full frame.
    pub fn read_frame(
        &self,
        fft: &mut FftProcessor,
        samples: &[f32],
        span: FrameSpan,
    ) -> Result<FrameReading> {
        let frame = span.slice(samples);
        if frame.iter().any(|s| !s.is_finite()) {
            return Ok(FrameReading::Skipped);
        }
        let bins = fft.analyze(frame, &self.window)?;
        if spread::band_power(bins, self.band.clone(), self.window_energy) < self.noise_floor {
            return Ok(FrameReading::Skipped);
        }
        let carrier = self.key.carrier(span.index as u64, self.band.len())?;
        let corr = spread::correlate(bins, &carrier, self.band.clone());
        tracing::trace!(frame = span.index, corr, "frame correlation");
        Ok(FrameReading::Measured(corr))
    }

    /// Combine per-frame readings (indexed by frame) into a report.
    pub fn conclude(&self, readings: &[FrameReading]) -> WatermarkReport {
        let coded_len = self.payload_bits * self.redundancy;
        // Per coded slot: (matched soft sum, matched count, raw soft sum, raw count).
        let mut slots = vec![(0.0f32, 0usize, 0.0f32, 0usize); coded_len];

        let mut report = WatermarkReport::empty();
        let mut corr_sum = 0.0f32;
        for (index, reading) in readings.iter().enumerate() {
            let FrameReading::Measured(corr) = *reading else {
                continue;
            };
            report.frames_analyzed += 1;
            corr_sum += corr.abs();
            let matched = corr.abs() >= self.threshold;
            if matched {
                report.frames_matched += 1;
            }
            if coded_len > 0 {
                let slot = &mut slots[index % coded_len];
                if matched {
                    slot.0 += corr;
                    slot.1 += 1;
                }
                slot.2 += corr;
                slot.3 += 1;
            }
        }

        if report.frames_analyzed == 0 {
            tracing::debug!("no frames above the noise floor");
            return report;
        }
        let analyzed = report.frames_analyzed as f32;
        report.confidence = report.frames_matched as f32 / analyzed;
        report.mean_correlation = corr_sum / analyzed;
        report.watermark_detected = report.confidence >= self.min_fraction;

        if report.watermark_detected {
            let symbols: Vec<Symbol> = slots
                .iter()
                .map(|&(soft, matched, raw, seen)| {
                    if matched > 0 {
                        Symbol::Reliable(soft > 0.0)
                    } else if seen > 0 {
                        Symbol::Erased(Some(raw > 0.0))
                    } else {
                        Symbol::Erased(None)
                    }
                })
                .collect();
            let decoded = Repetition::new(self.redundancy).decode_symbols(&symbols);
            report.corrected_bits = decoded.corrected;
            report.uncorrectable_bits = decoded.uncorrectable;
            report.payload = Some(Payload::from_bits(decoded.bits));
        }
        report
    }
}

/// Look for this key's watermark in `signal`.
///
/// Only configuration errors and an empty signal fail; anything decodable
/// yields a report, with low confidence expressing uncertainty.
pub fn verify_watermark(signal: &Signal, config: &GuardConfig) -> Result<WatermarkReport> {
    let plan = DetectPlan::new(signal, config)?;
    let samples = signal.samples();
    let framer = plan.framer(samples.len());
    tracing::debug!(frames = framer.frame_count(), "scanning for watermark");

    let mut fft = FftProcessor::new(plan.frame_size)?;
    let readings = framer
        .frames()
        .map(|span| plan.read_frame(&mut fft, samples, span))
        .collect::<Result<Vec<_>>>()?;

    let report = plan.conclude(&readings);
    tracing::info!(
        detected = report.watermark_detected,
        confidence = report.confidence,
        analyzed = report.frames_analyzed,
        matched = report.frames_matched,
        "watermark check finished"
    );
    Ok(report)
}
