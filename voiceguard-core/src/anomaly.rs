//! Key-independent spectral statistics that betray synthetic speech.
//!
//! Vocoders tend to leave unnaturally flat or unnaturally even magnitude
//! spectra and phase that does not evolve smoothly from frame to frame. These
//! are measured here, together with the coarse spectral shape, and folded
//! into one score.

use realfft::num_complex::{Complex32, Complex64};
use serde::Serialize;

use crate::config::GuardConfig;
use crate::error::{Error, Result};
use crate::fft::FftProcessor;
use crate::frame::{FrameMode, FrameSpan, Framer, hann_window, window_energy};
use crate::signal::Signal;
use crate::spread;

/// Fraction of spectral power below the rolloff frequency.
const ROLLOFF_FRACTION: f64 = 0.85;

/// Keeps `ln` finite on empty bins.
const POWER_EPSILON: f64 = 1e-30;

/// Power-spectrum `E[p^2] / E[p]^2` of Gaussian noise, whose bins are
/// exponentially distributed.
const GAUSSIAN_POWER_RATIO: f64 = 2.0;

// Score weights. Natural speech and broadband noise land near 0.45; a flat or
// unnaturally even spectrum with scrambled phase lands above 0.85.
const SCORE_BASE: f64 = 0.30;
const GATE_WEIGHT: f64 = 0.50;
const REGULARITY_GATE_CENTER: f64 = 0.10;
const REGULARITY_GATE_WIDTH: f64 = 0.015;
const FLATNESS_GATE_CENTER: f64 = 0.75;
const FLATNESS_GATE_WIDTH: f64 = 0.05;
const FLATNESS_WEIGHT: f64 = 0.08;
const PHASE_WEIGHT: f64 = 0.08;
const SHAPE_WEIGHT: f64 = 0.04;

/// Frame-averaged spectral features.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SpectralFeatures {
    /// Magnitude-weighted mean frequency.
    pub centroid_hz: f32,
    /// Magnitude-weighted spread around the centroid.
    pub bandwidth_hz: f32,
    /// Frequency below which 85% of the power lies.
    pub rolloff_hz: f32,
    /// Geometric over arithmetic mean of the power spectrum, in [0, 1].
    pub flatness: f32,
    /// How much more even each frame's power spectrum is than Gaussian
    /// noise, in [0, 1]. Zero for noise and for peaky spectra such as speech.
    pub regularity: f32,
    /// Energy-weighted circular variance of the frame-to-frame phase
    /// advance, in [0, 1]. Zero for stationary tones.
    pub phase_discontinuity: f32,
}

impl SpectralFeatures {
    /// Combine the features into a synthesis likelihood in [0, 1].
    pub fn score(&self, nyquist_hz: f32) -> f32 {
        let nyquist = f64::from(nyquist_hz.max(f32::MIN_POSITIVE));
        let shape = (f64::from(self.centroid_hz)
            + f64::from(self.bandwidth_hz)
            + f64::from(self.rolloff_hz))
            / (3.0 * nyquist);
        let flatness = f64::from(self.flatness);
        let regularity = f64::from(self.regularity);
        let gate = sigmoid(f64::max(
            (regularity - REGULARITY_GATE_CENTER) / REGULARITY_GATE_WIDTH,
            (flatness - FLATNESS_GATE_CENTER) / FLATNESS_GATE_WIDTH,
        ));

        let score = SCORE_BASE
            + GATE_WEIGHT * gate
            + FLATNESS_WEIGHT * flatness
            + PHASE_WEIGHT * f64::from(self.phase_discontinuity)
            + SHAPE_WEIGHT * shape;
        score.clamp(0.0, 1.0) as f32
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Outcome of anomaly scoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub anomaly_detected: bool,
    pub score: f32,
    pub features: SpectralFeatures,
    /// Non-silent frames that contributed.
    pub frames_analyzed: usize,
}

/// Per-call scorer state.
pub(crate) struct AnomalyPlan {
    pub window: Vec<f32>,
    window_energy: f32,
    pub frame_size: usize,
    sample_rate: u32,
    noise_floor: f32,
    threshold: f32,
}

impl AnomalyPlan {
    pub fn new(signal: &Signal, config: &GuardConfig) -> Result<Self> {
        if signal.sample_rate() == 0 {
            return Err(Error::InvalidConfig("sample rate must be positive".into()));
        }
        config.check_frame_size()?;
        if signal.is_empty() {
            return Err(Error::EmptySignal);
        }
        let window = hann_window(config.frame_size);
        Ok(Self {
            window_energy: window_energy(&window),
            window,
            frame_size: config.frame_size,
            sample_rate: signal.sample_rate(),
            noise_floor: config.noise_floor,
            threshold: config.anomaly_threshold,
        })
    }

    pub fn framer(&self, signal_len: usize) -> Framer {
        Framer::new(self.frame_size, signal_len, FrameMode::Drop)
    }

    /// Spectrum of one frame, or `None` if it is silent or not finite.
    pub fn spectrum(
        &self,
        fft: &mut FftProcessor,
        samples: &[f32],
        span: FrameSpan,
    ) -> Result<Option<Vec<Complex32>>> {
        let frame = span.slice(samples);
        if frame.iter().any(|s| !s.is_finite()) {
            return Ok(None);
        }
        let bins = fft.analyze(frame, &self.window)?;
        let audible = 1..self.frame_size / 2;
        if spread::band_power(bins, audible, self.window_energy) < self.noise_floor {
            return Ok(None);
        }
        Ok(Some(bins.to_vec()))
    }

    /// Average features over frames (in frame order) and score them.
    pub fn conclude(&self, spectra: &[Option<Vec<Complex32>>]) -> AnomalyReport {
        let bin_hz = f64::from(self.sample_rate) / self.frame_size as f64;
        let mut shape_sum = [0.0f64; 5];
        let mut phase = PhaseTracker::new(self.frame_size);
        let mut frames = 0usize;

        let mut previous: Option<&[Complex32]> = None;
        for spectrum in spectra {
            let Some(bins) = spectrum.as_deref() else {
                previous = None;
                continue;
            };
            let shape = frame_shape(bins, bin_hz);
            for (acc, v) in shape_sum.iter_mut().zip(shape) {
                *acc += v;
            }
            if let Some(prev) = previous {
                phase.push(prev, bins);
            }
            previous = Some(bins);
            frames += 1;
        }

        if frames == 0 {
            tracing::debug!("no frames above the noise floor");
            return AnomalyReport {
                anomaly_detected: false,
                score: 0.0,
                features: SpectralFeatures::default(),
                frames_analyzed: 0,
            };
        }

        let n = frames as f64;
        let features = SpectralFeatures {
            centroid_hz: (shape_sum[0] / n) as f32,
            bandwidth_hz: (shape_sum[1] / n) as f32,
            rolloff_hz: (shape_sum[2] / n) as f32,
            flatness: (shape_sum[3] / n) as f32,
            regularity: (GAUSSIAN_POWER_RATIO - (shape_sum[4] / n).exp()).clamp(0.0, 1.0) as f32,
            phase_discontinuity: phase.discontinuity() as f32,
        };
        let score = features.score(self.sample_rate as f32 / 2.0);
        AnomalyReport {
            anomaly_detected: score >= self.threshold,
            score,
            features,
            frames_analyzed: frames,
        }
    }
}

/// Centroid, bandwidth, rolloff (all Hz), flatness and `ln(E[p^2] / E[p]^2)`
/// of one spectrum, ignoring the DC and Nyquist bins.
fn frame_shape(bins: &[Complex32], bin_hz: f64) -> [f64; 5] {
    let inner = &bins[1..bins.len() - 1];
    let freq = |i: usize| (i + 1) as f64 * bin_hz;

    let mags: Vec<f64> = inner.iter().map(|b| f64::from(b.norm())).collect();
    let mag_total: f64 = mags.iter().sum();
    let powers: Vec<f64> = mags.iter().map(|m| m * m).collect();
    let power_total: f64 = powers.iter().sum();
    if mag_total <= 0.0 || power_total <= 0.0 {
        return [0.0, 0.0, 0.0, 0.0, GAUSSIAN_POWER_RATIO.ln()];
    }

    let centroid = mags.iter().enumerate().map(|(i, m)| freq(i) * m).sum::<f64>() / mag_total;
    let spread = mags
        .iter()
        .enumerate()
        .map(|(i, m)| (freq(i) - centroid).powi(2) * m)
        .sum::<f64>()
        / mag_total;

    let mut cumulative = 0.0;
    let mut rolloff = freq(inner.len() - 1);
    for (i, p) in powers.iter().enumerate() {
        cumulative += p;
        if cumulative >= ROLLOFF_FRACTION * power_total {
            rolloff = freq(i);
            break;
        }
    }

    let count = powers.len() as f64;
    let log_mean = powers.iter().map(|p| (p + POWER_EPSILON).ln()).sum::<f64>() / count;
    let mean_power = power_total / count;
    let flatness = (log_mean.exp() / mean_power).clamp(0.0, 1.0);
    let power_ratio = powers.iter().map(|p| p * p).sum::<f64>() / count / (mean_power * mean_power);

    [centroid, spread.sqrt(), rolloff, flatness, power_ratio.ln()]
}

/// Accumulates, per bin, the deviation of the observed phase advance from
/// the advance a stationary sinusoid at the bin frequency would show.
struct PhaseTracker {
    /// Sum of `|X_t||X_t-1| * exp(i * deviation)`.
    resultant: Vec<Complex64>,
    weight: Vec<f64>,
    /// `exp(-i * expected advance)` per bin.
    rewind: Vec<Complex64>,
}

impl PhaseTracker {
    fn new(frame_size: usize) -> Self {
        let bins = frame_size / 2 + 1;
        let hop = (frame_size / 2) as f64;
        let rewind = (0..bins)
            .map(|k| {
                let advance = 2.0 * std::f64::consts::PI * k as f64 * hop / frame_size as f64;
                Complex64::from_polar(1.0, -advance)
            })
            .collect();
        Self {
            resultant: vec![Complex64::new(0.0, 0.0); bins],
            weight: vec![0.0; bins],
            rewind,
        }
    }

    fn push(&mut self, previous: &[Complex32], current: &[Complex32]) {
        let last = current.len() - 1;
        for k in 1..last {
            let prev = Complex64::new(f64::from(previous[k].re), f64::from(previous[k].im));
            let cur = Complex64::new(f64::from(current[k].re), f64::from(current[k].im));
            self.resultant[k] += cur * prev.conj() * self.rewind[k];
            self.weight[k] += cur.norm() * prev.norm();
        }
    }

    /// Energy-weighted mean circular variance over bins.
    fn discontinuity(&self) -> f64 {
        let total: f64 = self.weight.iter().sum();
        if total <= 0.0 {
            return 0.0;
        }
        let spread: f64 = self
            .weight
            .iter()
            .zip(&self.resultant)
            .map(|(w, r)| w - r.norm())
            .sum();
        (spread / total).clamp(0.0, 1.0)
    }
}

/// Score how likely `signal` is to be synthetic speech.
///
/// Silent and non-finite frames are excluded; a signal with no usable
/// frames scores 0.
pub fn score_anomaly(signal: &Signal, config: &GuardConfig) -> Result<AnomalyReport> {
    let plan = AnomalyPlan::new(signal, config)?;
    let samples = signal.samples();
    let framer = plan.framer(samples.len());

    let mut fft = FftProcessor::new(plan.frame_size)?;
    let spectra = framer
        .frames()
        .map(|span| plan.spectrum(&mut fft, samples, span))
        .collect::<Result<Vec<_>>>()?;

    let report = plan.conclude(&spectra);
    tracing::info!(
        score = report.score,
        anomaly = report.anomaly_detected,
        flatness = report.features.flatness,
        regularity = report.features.regularity,
        phase = report.features.phase_discontinuity,
        "anomaly score computed"
    );
    Ok(report)
}
