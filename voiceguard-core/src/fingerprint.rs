//! MFCC voice fingerprints for speaker comparison.
//!
//! A fingerprint is the per-coefficient mean and standard deviation of the
//! mel-frequency cepstrum over the voiced part of a recording. Two
//! fingerprints are compared by cosine similarity.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fft::FftProcessor;
use crate::frame::{FrameMode, Framer, hann_window};
use crate::signal::Signal;

/// Cepstral coefficients kept per frame.
pub const NUM_COEFFICIENTS: usize = 40;
/// Similarity at or above which two fingerprints are the same voice.
pub const MATCH_THRESHOLD: f64 = 0.78;

const FRAME_SIZE: usize = 1024;
const NUM_MEL_BANDS: usize = 64;
/// Frames this far below the loudest frame count as silence when trimming.
const TRIM_TOP_DB: f64 = 20.0;
/// Trimming is undone if less than this much audio would remain.
const MIN_TRIMMED_SECS: f64 = 0.5;
/// Mel energies are floored this far below the loudest one.
const DYNAMIC_RANGE_DB: f64 = 80.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceFingerprint {
    /// Coefficient means followed by coefficient standard deviations.
    pub coefficients: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FingerprintMatch {
    pub matched: bool,
    pub similarity: f64,
    /// 0 at similarity 0.5 or below, 100 at similarity 1.
    pub confidence: u8,
}

/// Extract a voice fingerprint from `signal`.
pub fn extract(signal: &Signal) -> Result<VoiceFingerprint> {
    if signal.sample_rate() == 0 {
        return Err(Error::InvalidConfig("sample rate must be positive".into()));
    }
    if signal.is_empty() {
        return Err(Error::EmptySignal);
    }

    let samples = signal.samples();
    let voiced = trim_silence(samples, signal.sample_rate());
    tracing::debug!(
        start = voiced.start,
        end = voiced.end,
        total = samples.len(),
        "fingerprint region"
    );
    let samples = &samples[voiced];

    let window = hann_window(FRAME_SIZE);
    let filters = mel_filterbank(signal.sample_rate(), FRAME_SIZE, NUM_MEL_BANDS);
    let mut fft = FftProcessor::new(FRAME_SIZE)?;

    let mut mel_db = Vec::new();
    for span in Framer::new(FRAME_SIZE, samples.len(), FrameMode::Pad).frames() {
        let bins = fft.analyze(span.slice(samples), &window)?;
        let power: Vec<f64> = bins.iter().map(|b| f64::from(b.norm_sqr())).collect();
        let frame: Vec<f64> = filters
            .iter()
            .map(|filter| {
                let energy: f64 = filter.iter().map(|&(bin, w)| w * power[bin]).sum();
                10.0 * energy.max(1e-10).log10()
            })
            .collect();
        mel_db.push(frame);
    }

    let ceiling = mel_db
        .iter()
        .flatten()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let floor = ceiling - DYNAMIC_RANGE_DB;

    let cepstra: Vec<Vec<f64>> = mel_db
        .iter()
        .map(|frame| {
            let clamped: Vec<f64> = frame.iter().map(|&db| db.max(floor)).collect();
            dct_ortho(&clamped, NUM_COEFFICIENTS)
        })
        .collect();

    let n = cepstra.len() as f64;
    let mut means = vec![0.0; NUM_COEFFICIENTS];
    for frame in &cepstra {
        for (m, c) in means.iter_mut().zip(frame) {
            *m += c / n;
        }
    }
    let mut stds = vec![0.0; NUM_COEFFICIENTS];
    for frame in &cepstra {
        for ((s, c), m) in stds.iter_mut().zip(frame).zip(&means) {
            *s += (c - m).powi(2) / n;
        }
    }
    stds.iter_mut().for_each(|s| *s = s.sqrt());

    means.extend(stds);
    Ok(VoiceFingerprint {
        coefficients: means,
    })
}

/// Compare a stored fingerprint against a candidate.
///
/// Fingerprints of different lengths are compared over their common prefix.
pub fn compare(stored: &VoiceFingerprint, candidate: &VoiceFingerprint) -> FingerprintMatch {
    let len = stored.coefficients.len().min(candidate.coefficients.len());
    let similarity = cosine_similarity(&stored.coefficients[..len], &candidate.coefficients[..len]);
    let confidence = ((similarity - 0.5) / 0.5 * 100.0).clamp(0.0, 100.0) as u8;
    FingerprintMatch {
        matched: similarity >= MATCH_THRESHOLD,
        similarity,
        confidence,
    }
}

/// Cosine similarity; 0 if either vector is all zeros.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    a.iter().zip(b).map(|(x, y)| x * y).sum::<f64>() / (norm_a * norm_b)
}

/// Sample range between the first and last frame within `TRIM_TOP_DB` of
/// the loudest frame. The whole signal if that leaves too little audio.
fn trim_silence(samples: &[f32], sample_rate: u32) -> Range<usize> {
    let whole = 0..samples.len();
    let framer = Framer::new(FRAME_SIZE, samples.len(), FrameMode::Pad);
    let rms: Vec<f64> = framer
        .frames()
        .map(|span| {
            let frame = span.slice(samples);
            let energy: f64 = frame.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
            (energy / FRAME_SIZE as f64).sqrt()
        })
        .collect();

    let loudest = rms.iter().copied().fold(0.0f64, f64::max);
    if loudest <= 0.0 {
        return whole;
    }
    let gate = loudest * 10f64.powf(-TRIM_TOP_DB / 20.0);
    let (Some(first), Some(last)) = (
        rms.iter().position(|&r| r > gate),
        rms.iter().rposition(|&r| r > gate),
    ) else {
        return whole;
    };

    let (Some(first), Some(last)) = (framer.span(first), framer.span(last)) else {
        return whole;
    };
    let voiced = first.offset..last.offset + last.len;
    if (voiced.len() as f64) < MIN_TRIMMED_SECS * f64::from(sample_rate) {
        return whole;
    }
    voiced
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// Area-normalized triangular mel filters as sparse `(bin, weight)` lists.
fn mel_filterbank(sample_rate: u32, frame_size: usize, bands: usize) -> Vec<Vec<(usize, f64)>> {
    let nyquist = f64::from(sample_rate) / 2.0;
    let bin_hz = f64::from(sample_rate) / frame_size as f64;
    let top = hz_to_mel(nyquist);
    let edges: Vec<f64> = (0..bands + 2)
        .map(|i| mel_to_hz(top * i as f64 / (bands + 1) as f64))
        .collect();

    (0..bands)
        .map(|m| {
            let (lo, center, hi) = (edges[m], edges[m + 1], edges[m + 2]);
            let norm = 2.0 / (hi - lo);
            (0..=frame_size / 2)
                .filter_map(|bin| {
                    let f = bin as f64 * bin_hz;
                    let rising = (f - lo) / (center - lo);
                    let falling = (hi - f) / (hi - center);
                    let w = rising.min(falling);
                    (w > 0.0).then_some((bin, w * norm))
                })
                .collect()
        })
        .collect()
}

/// First `count` coefficients of the orthonormal DCT-II of `x`.
fn dct_ortho(x: &[f64], count: usize) -> Vec<f64> {
    let n = x.len() as f64;
    (0..count)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            let sum: f64 = x
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    v * (std::f64::consts::PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos()
                })
                .sum();
            scale * sum
        })
        .collect()
}
