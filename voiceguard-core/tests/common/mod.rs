//! Signal generators shared by the integration tests.

#![allow(dead_code)]

use std::f32::consts::PI;

use voiceguard_core::fft::FftProcessor;
use voiceguard_core::frame::hann_window;

/// Deterministic xorshift32 PRNG.
pub fn xorshift32(state: &mut u32) -> u32 {
    *state ^= *state << 13;
    *state ^= *state >> 17;
    *state ^= *state << 5;
    *state
}

fn uniform(state: &mut u32) -> f32 {
    (xorshift32(state) as f32 / u32::MAX as f32).max(1e-10)
}

/// Gaussian white noise via Box-Muller.
pub fn gaussian_noise(num_samples: usize, std_dev: f32, seed: u32) -> Vec<f32> {
    let mut state = seed.max(1);
    (0..num_samples)
        .map(|_| {
            let u1 = uniform(&mut state);
            let u2 = uniform(&mut state);
            std_dev * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
        })
        .collect()
}

/// Voiced-speech stand-in: a 140 Hz glottal source with vibrato and twenty
/// harmonics under a slow amplitude envelope, plus faint breath noise.
pub fn voice_like(num_samples: usize, sample_rate: u32, seed: u32) -> Vec<f32> {
    let breath = gaussian_noise(num_samples, 0.01, seed);
    harmonic_source(num_samples, sample_rate)
        .iter()
        .zip(&breath)
        .map(|(v, b)| v + b)
        .collect()
}

/// The voiced part of [`voice_like`] alone. Its spectrum is nothing but
/// harmonics, with no noise between them.
pub fn harmonic_source(num_samples: usize, sample_rate: u32) -> Vec<f32> {
    let sr = sample_rate as f32;
    let mut phase = 0.0f32;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sr;
            let f0 = 140.0 + 10.0 * (2.0 * PI * 3.0 * t).sin();
            phase = (phase + 2.0 * PI * f0 / sr) % (2.0 * PI);
            let voiced: f32 = (1..=20)
                .map(|h| (h as f32 * phase).sin() / h as f32)
                .sum();
            let envelope = 0.6 + 0.4 * (2.0 * PI * 2.0 * t).sin();
            0.15 * envelope * voiced
        })
        .collect()
}

/// Pure sine at `freq` Hz.
pub fn tone(num_samples: usize, sample_rate: u32, freq: f32, amplitude: f32) -> Vec<f32> {
    let step = f64::from(freq) / f64::from(sample_rate);
    (0..num_samples)
        .map(|i| {
            let cycles = (i as f64 * step).fract() as f32;
            amplitude * (2.0 * PI * cycles).sin()
        })
        .collect()
}

/// C major triad (C4, E4, G4), 0.2 amplitude per note.
pub fn chord(num_samples: usize, sample_rate: u32) -> Vec<f32> {
    let notes = [261.63f32, 329.63, 392.0]
        .map(|freq| tone(num_samples, sample_rate, freq, 0.2));
    (0..num_samples)
        .map(|i| notes.iter().map(|note| note[i]).sum())
        .collect()
}

/// One band-limited pulse per `hop` samples, each with a random phase.
///
/// The long-term spectrum is flat and frame-to-frame phase is scrambled,
/// which is what vocoder output tends to look like.
pub fn pulse_train(num_samples: usize, hop: usize, seed: u32) -> Vec<f32> {
    shifted_pulse_train(num_samples, hop, 0, seed)
}

/// [`pulse_train`] with the first pulse centred at `shift` instead of 0.
pub fn shifted_pulse_train(num_samples: usize, hop: usize, shift: usize, seed: u32) -> Vec<f32> {
    let mut state = seed.max(1);
    let k_max = hop / 2 - 1;
    let half = (hop / 2) as isize;

    // cos and sin parts of the pulse shape, so each pulse only mixes them.
    let shape = |n: isize, trig: fn(f32) -> f32| -> f32 {
        (1..=k_max)
            .map(|k| trig(2.0 * PI * k as f32 * n as f32 / hop as f32))
            .sum::<f32>()
            / k_max as f32
    };
    let cos_part: Vec<f32> = (-half..half).map(|n| shape(n, f32::cos)).collect();
    let sin_part: Vec<f32> = (-half..half).map(|n| shape(n, f32::sin)).collect();

    let mut out = vec![0.0f32; num_samples];
    for center in (shift..num_samples + hop).step_by(hop) {
        let phi = xorshift32(&mut state) as f32 / u32::MAX as f32 * 2.0 * PI;
        let (sin_phi, cos_phi) = phi.sin_cos();
        for (j, n) in (-half..half).enumerate() {
            let pos = center as isize + n;
            if pos < 0 || pos >= num_samples as isize {
                continue;
            }
            out[pos as usize] += 0.5 * (cos_part[j] * cos_phi - sin_part[j] * sin_phi);
        }
    }
    out
}

/// Frame-by-frame synthesis with a flat magnitude spectrum and random
/// phases, Hann-windowed and overlap-added at 50% on a grid that starts
/// `offset` samples in, so it does not line up with the analysis frames.
pub fn random_phase_frames(
    num_samples: usize,
    frame_size: usize,
    offset: usize,
    seed: u32,
) -> Vec<f32> {
    let mut state = seed.max(1);
    let mut fft = FftProcessor::new(frame_size).unwrap();
    let window = hann_window(frame_size);
    let magnitude = frame_size as f32 / 320.0;

    let mut out = vec![0.0f32; num_samples];
    let mut start = offset as isize - frame_size as isize;
    while start < num_samples as isize {
        let bins = fft.freq_bins_mut();
        let last = bins.len() - 1;
        for (k, bin) in bins.iter_mut().enumerate() {
            let phi = xorshift32(&mut state) as f32 / u32::MAX as f32 * 2.0 * PI;
            bin.re = if k == 0 || k == last { 0.0 } else { magnitude * phi.cos() };
            bin.im = if k == 0 || k == last { 0.0 } else { magnitude * phi.sin() };
        }
        let frame = fft.synthesize().unwrap();
        for (i, (s, w)) in frame.iter().zip(&window).enumerate() {
            let pos = start + i as isize;
            if (0..num_samples as isize).contains(&pos) {
                out[pos as usize] += s * w;
            }
        }
        start += frame_size as isize / 2;
    }
    out
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}
