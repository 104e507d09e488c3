//! Overlapping analysis frames over a sample buffer.
//!
//! Frames are `(offset, len)` spans into the caller's buffer rather than
//! copies, so per-frame work can run in parallel over a shared slice.

/// How a trailing partial frame is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    /// Keep the trailing partial frame; it is zero-padded when analyzed.
    /// Used for embedding so every sample is covered.
    Pad,
    /// Skip frames that extend past the end of the signal.
    /// Used for detection and scoring so every spectrum is complete.
    Drop,
}

/// One analysis frame: its index and the sample range it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpan {
    pub index: usize,
    pub offset: usize,
    /// Number of real samples in the frame (less than the frame size only
    /// for a padded trailing frame).
    pub len: usize,
}

impl FrameSpan {
    /// The samples covered by this frame.
    pub fn slice<'a>(&self, samples: &'a [f32]) -> &'a [f32] {
        &samples[self.offset..self.offset + self.len]
    }
}

/// Splits a signal of known length into 50%-overlapping frames.
#[derive(Debug, Clone, Copy)]
pub struct Framer {
    frame_size: usize,
    hop_size: usize,
    signal_len: usize,
    mode: FrameMode,
}

impl Framer {
    pub fn new(frame_size: usize, signal_len: usize, mode: FrameMode) -> Self {
        Self {
            frame_size,
            hop_size: (frame_size / 2).max(1),
            signal_len,
            mode,
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Number of frames this framer yields.
    pub fn frame_count(&self) -> usize {
        let (len, n, hop) = (self.signal_len, self.frame_size, self.hop_size);
        match self.mode {
            FrameMode::Drop if len < n => 0,
            FrameMode::Drop => (len - n) / hop + 1,
            FrameMode::Pad if len == 0 => 0,
            FrameMode::Pad if len <= n => 1,
            FrameMode::Pad => (len - n).div_ceil(hop) + 1,
        }
    }

    /// The frame at `index`, if it exists.
    pub fn span(&self, index: usize) -> Option<FrameSpan> {
        if index >= self.frame_count() {
            return None;
        }
        let offset = index * self.hop_size;
        Some(FrameSpan {
            index,
            offset,
            len: self.frame_size.min(self.signal_len - offset),
        })
    }

    /// A fresh iterator over all frames, starting at index 0.
    pub fn frames(&self) -> Frames {
        Frames {
            framer: *self,
            next: 0,
            count: self.frame_count(),
        }
    }
}

/// Iterator returned by [`Framer::frames`].
#[derive(Debug, Clone)]
pub struct Frames {
    framer: Framer,
    next: usize,
    count: usize,
}

impl Iterator for Frames {
    type Item = FrameSpan;

    fn next(&mut self) -> Option<FrameSpan> {
        if self.next >= self.count {
            return None;
        }
        let span = self.framer.span(self.next);
        self.next += 1;
        span
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Frames {}

/// Generate a periodic Hann window of the given size.
///
/// The periodic form sums to exactly 1.0 at 50% overlap.
pub fn hann_window(size: usize) -> Vec<f32> {
    let n = size as f32;
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n).cos()))
        .collect()
}

/// Generate a periodic square-root Hann (sine) window.
///
/// Used as both analysis and synthesis window: the product of the two is a
/// Hann window, so windowed overlap-add at 50% overlap reconstructs exactly.
pub fn sqrt_hann_window(size: usize) -> Vec<f32> {
    let n = size as f32;
    (0..size)
        .map(|i| (std::f32::consts::PI * i as f32 / n).sin())
        .collect()
}

/// Sum of squared window coefficients.
pub fn window_energy(window: &[f32]) -> f32 {
    window.iter().map(|w| w * w).sum()
}

/// Overlap-add reconstruction helper.
///
/// Adds `frame` into `output` starting at `offset`, applying the synthesis
/// `window`. Samples falling past the end of `output` are discarded.
pub fn overlap_add(output: &mut [f32], frame: &[f32], window: &[f32], offset: usize) {
    if offset >= output.len() {
        return;
    }
    let end = (offset + frame.len()).min(output.len());
    for ((out, &s), &w) in output[offset..end].iter_mut().zip(frame).zip(window) {
        *out += s * w;
    }
}
