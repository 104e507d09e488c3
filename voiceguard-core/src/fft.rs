use realfft::num_complex::Complex32;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Pre-allocated real FFT for one fixed frame size.
///
/// Owns its time buffer, so a frame can be windowed, analyzed, modified in
/// the frequency domain and synthesized again without per-frame allocation.
pub struct FftProcessor {
    frame_size: usize,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
    time_buf: Vec<f32>,
    freq_buf: Vec<Complex32>,
    scratch_fwd: Vec<Complex32>,
    scratch_inv: Vec<Complex32>,
}

impl FftProcessor {
    /// Create a processor for the given frame size (even and > 0).
    pub fn new(frame_size: usize) -> Result<Self> {
        if frame_size == 0 || !frame_size.is_multiple_of(2) {
            return Err(Error::Fft(format!(
                "frame size must be even and positive, got {frame_size}"
            )));
        }
        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(frame_size);
        let inverse = planner.plan_fft_inverse(frame_size);

        Ok(Self {
            frame_size,
            time_buf: forward.make_input_vec(),
            freq_buf: forward.make_output_vec(),
            scratch_fwd: forward.make_scratch_vec(),
            scratch_inv: inverse.make_scratch_vec(),
            forward,
            inverse,
        })
    }

    /// Number of complex frequency bins (frame_size/2 + 1).
    pub fn num_bins(&self) -> usize {
        self.frame_size / 2 + 1
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Window `frame` and transform it to the frequency domain.
    ///
    /// `frame` may be shorter than the frame size; the remainder is
    /// zero-padded. `window` must have exactly `frame_size` elements.
    pub fn analyze(&mut self, frame: &[f32], window: &[f32]) -> Result<&mut [Complex32]> {
        if window.len() != self.frame_size || frame.len() > self.frame_size {
            return Err(Error::Fft(format!(
                "expected at most {} samples and a {}-point window, got {} and {}",
                self.frame_size,
                self.frame_size,
                frame.len(),
                window.len()
            )));
        }
        for (i, t) in self.time_buf.iter_mut().enumerate() {
            *t = frame.get(i).copied().unwrap_or(0.0) * window[i];
        }
        self.forward
            .process_with_scratch(&mut self.time_buf, &mut self.freq_buf, &mut self.scratch_fwd)
            .map_err(|e| Error::Fft(e.to_string()))?;
        Ok(&mut self.freq_buf)
    }

    /// Transform the current spectrum back to the time domain.
    ///
    /// The result is normalized to unit scale (realfft's inverse scales by
    /// `frame_size`).
    pub fn synthesize(&mut self) -> Result<&[f32]> {
        // A real signal has purely real DC and Nyquist bins.
        let last = self.freq_buf.len() - 1;
        self.freq_buf[0].im = 0.0;
        self.freq_buf[last].im = 0.0;
        self.inverse
            .process_with_scratch(&mut self.freq_buf, &mut self.time_buf, &mut self.scratch_inv)
            .map_err(|e| Error::Fft(e.to_string()))?;
        let scale = 1.0 / self.frame_size as f32;
        for s in self.time_buf.iter_mut() {
            *s *= scale;
        }
        Ok(&self.time_buf)
    }

    pub fn freq_bins(&self) -> &[Complex32] {
        &self.freq_buf
    }

    pub fn freq_bins_mut(&mut self) -> &mut [Complex32] {
        &mut self.freq_buf
    }
}
