use std::ops::Range;

use crate::codec::{ErrorCorrection, Repetition};
use crate::config::GuardConfig;
use crate::error::{Error, Result};
use crate::fft::FftProcessor;
use crate::frame::{FrameMode, FrameSpan, Framer, overlap_add, sqrt_hann_window};
use crate::key::WatermarkKey;
use crate::payload::Payload;
use crate::signal::Signal;
use crate::spread;

/// Everything needed to compute the perturbation of any single frame.
///
/// Built once per `protect` call; frames can then be processed in any order
/// (or in parallel) and overlap-added afterwards.
pub(crate) struct EmbedPlan {
    pub key: WatermarkKey,
    pub window: Vec<f32>,
    pub band: Range<usize>,
    pub coded_bits: Vec<bool>,
    pub strength: f32,
    pub frame_size: usize,
}

impl EmbedPlan {
    /// Validate inputs and prepare the coded bit stream.
    pub fn new(signal: &Signal, config: &GuardConfig, payload: &Payload) -> Result<Self> {
        config.validate(signal.sample_rate())?;
        if signal.is_empty() {
            return Err(Error::EmptySignal);
        }

        let data_bits = payload.padded_bits(config.payload_bits)?;
        let coded_bits = Repetition::new(config.effective_redundancy()).encode(&data_bits);

        let available = Framer::new(config.frame_size, signal.len(), FrameMode::Drop).frame_count();
        if coded_bits.len() > available {
            return Err(Error::InsufficientCapacity {
                needed: coded_bits.len(),
                available,
            });
        }

        let band = config.band_bins(signal.sample_rate())?;
        tracing::debug!(
            coded_bits = coded_bits.len(),
            available,
            band_start = band.start,
            band_end = band.end,
            "embed plan ready"
        );

        Ok(Self {
            key: WatermarkKey::derive(&config.secret_key)?,
            window: sqrt_hann_window(config.frame_size),
            band,
            coded_bits,
            strength: config.embed_strength,
            frame_size: config.frame_size,
        })
    }

    /// Bit carried by the frame at `index`. The coded stream repeats for the
    /// whole signal; an empty stream carries a constant 1.
    pub fn bit_for(&self, index: usize) -> bool {
        if self.coded_bits.is_empty() {
            true
        } else {
            self.coded_bits[index % self.coded_bits.len()]
        }
    }

    /// Time-domain perturbation for one frame, written into `out`.
    pub fn frame_delta(
        &self,
        fft: &mut FftProcessor,
        samples: &[f32],
        span: FrameSpan,
        out: &mut Vec<f32>,
    ) -> Result<()> {
        let carrier = self.key.carrier(span.index as u64, self.band.len())?;
        let bins = fft.analyze(span.slice(samples), &self.window)?;
        spread::perturbation(
            bins,
            &carrier,
            self.bit_for(span.index),
            self.strength,
            self.band.clone(),
        );
        out.clear();
        out.extend_from_slice(fft.synthesize()?);
        Ok(())
    }
}

/// Scale `samples` down so the peak is at most 1.0.
pub(crate) fn normalize_peak(samples: &mut [f32]) {
    let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    if peak > 1.0 {
        tracing::warn!(peak, "watermarked signal exceeds full scale, normalizing");
        let gain = 1.0 / peak;
        samples.iter_mut().for_each(|s| *s *= gain);
    }
}

/// Embed a keyed watermark carrying `payload` into a copy of `signal`.
///
/// Every frame's in-band magnitudes are scaled by `1 ± strength` following
/// the frame's carrier and payload bit. Frames are analyzed and resynthesized
/// with a sine window pair, and only the windowed perturbations are
/// overlap-added onto the original samples, so a zero strength returns the
/// input exactly. The result is peak-normalized if embedding pushed it past full scale.
pub fn protect(signal: &Signal, config: &GuardConfig, payload: &Payload) -> Result<Signal> {
    let plan = EmbedPlan::new(signal, config, payload)?;
    let samples = signal.samples();
    let framer = Framer::new(plan.frame_size, samples.len(), FrameMode::Pad);

    let mut fft = FftProcessor::new(plan.frame_size)?;
    let mut output = samples.to_vec();
    let mut delta = Vec::with_capacity(plan.frame_size);

    for span in framer.frames() {
        plan.frame_delta(&mut fft, samples, span, &mut delta)?;
        overlap_add(&mut output, &delta, &plan.window, span.offset);
    }

    normalize_peak(&mut output);
    tracing::info!(
        frames = framer.frame_count(),
        payload_bits = config.payload_bits,
        strength = config.embed_strength,
        "watermark embedded"
    );
    Ok(Signal::new(output, signal.sample_rate()))
}
