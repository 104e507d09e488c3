//! Spread-spectrum modulation of a single frame.
//!
//! A bit is carried by scaling every in-band bin's magnitude by
//! `1 + strength * carrier[i] * sign(bit)`. The perturbation is proportional
//! to the bin's own magnitude, so loud bins carry more of it and silent bins
//! carry none.

use std::cmp::Ordering;
use std::ops::Range;

use realfft::num_complex::Complex32;

/// Half-width (in bins) of the running median used as the local spectral
/// envelope during detection.
const ENVELOPE_HALF_WIDTH: usize = 2;

/// Guards `ln` against empty bins.
const LOG_EPSILON: f32 = 1e-12;

/// Replace `freq_bins` with the perturbation spectrum for this frame.
///
/// Bins outside `band` are zeroed, so synthesizing the result yields only
/// the signal to add to the original frame. `carrier` is indexed relative to
/// `band.start` and must cover the band.
pub fn perturbation(
    freq_bins: &mut [Complex32],
    carrier: &[f32],
    bit: bool,
    strength: f32,
    band: Range<usize>,
) {
    let sign = if bit { 1.0 } else { -1.0 };
    for (i, bin) in freq_bins.iter_mut().enumerate() {
        if band.contains(&i) {
            *bin *= strength * sign * carrier[i - band.start];
        } else {
            *bin = Complex32::new(0.0, 0.0);
        }
    }
}

/// Normalized correlation of a frame's spectrum against a carrier.
///
/// Each in-band bin's log-magnitude is compared to the median of its
/// neighbours, and only the sign of that residual is kept. Smooth spectral
/// slopes give a zero residual, and strong harmonics or formant peaks count
/// no more than any other bin, so the signs follow the keyed per-bin scaling.
/// The result is the cosine similarity of the sign vector with the carrier,
/// in [-1, 1]. Its sign is the embedded bit; without the watermark it is
/// close to zero with a standard deviation of about `1 / sqrt(band.len())`.
pub fn correlate(freq_bins: &[Complex32], carrier: &[f32], band: Range<usize>) -> f32 {
    let m = band.len();
    if m == 0 {
        return 0.0;
    }
    let log_mag: Vec<f32> = freq_bins[band]
        .iter()
        .map(|b| (b.norm() + LOG_EPSILON).ln())
        .collect();

    let mut neighbourhood = Vec::with_capacity(2 * ENVELOPE_HALF_WIDTH + 1);
    let mut signs: Vec<f64> = (0..m)
        .map(|i| {
            let lo = i.saturating_sub(ENVELOPE_HALF_WIDTH);
            let hi = (i + ENVELOPE_HALF_WIDTH + 1).min(m);
            neighbourhood.clear();
            neighbourhood.extend_from_slice(&log_mag[lo..hi]);
            neighbourhood.sort_unstable_by(f32::total_cmp);
            let median = neighbourhood[neighbourhood.len() / 2];
            match log_mag[i].total_cmp(&median) {
                Ordering::Greater => 1.0,
                Ordering::Less => -1.0,
                Ordering::Equal => 0.0,
            }
        })
        .collect();

    let mean = signs.iter().sum::<f64>() / m as f64;
    signs.iter_mut().for_each(|r| *r -= mean);

    let norm = signs.iter().map(|r| r * r).sum::<f64>().sqrt();
    if norm < 1e-12 {
        return 0.0;
    }
    let dot: f64 = signs
        .iter()
        .zip(carrier)
        .map(|(r, &c)| r * f64::from(c))
        .sum();
    (dot / (norm * (m as f64).sqrt())) as f32
}

/// Mean in-band power per sample.
///
/// Averages `|X|^2` over the band and divides by the analysis window's
/// energy (see [`crate::frame::window_energy`]), so white noise of variance
/// `s^2` reads `s^2` whatever the frame size.
pub fn band_power(freq_bins: &[Complex32], band: Range<usize>, window_energy: f32) -> f32 {
    if band.is_empty() || window_energy <= 0.0 {
        return 0.0;
    }
    let n = band.len();
    let total: f32 = freq_bins[band].iter().map(|b| b.norm_sqr()).sum();
    total / n as f32 / window_energy
}
