/// A mono audio waveform with its sample rate.
///
/// Samples are expected in [-1, 1]. The engine never mutates a caller's
/// signal; embedding returns a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Signal {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// An all-zero signal of the given duration.
    pub fn silence(duration_secs: f32, sample_rate: u32) -> Self {
        let len = (duration_secs * sample_rate as f32).round() as usize;
        Self::new(vec![0.0; len], sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
    }

    /// Leading portion of the signal, `fraction` in [0, 1].
    pub fn truncated(&self, fraction: f32) -> Self {
        let keep = (self.samples.len() as f32 * fraction.clamp(0.0, 1.0)).round() as usize;
        Self::new(self.samples[..keep].to_vec(), self.sample_rate)
    }
}
