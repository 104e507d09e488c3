//! Optional parallel processing using rayon.
//!
//! Enable with the `parallel` feature flag. Provides `protect_parallel` and
//! `verify_parallel`, which spread the per-frame FFT work over the rayon pool.
//! Overlap-add and the frame-ordered reductions stay sequential, so results
//! are identical to the single-threaded functions.

use rayon::prelude::*;

use crate::anomaly::AnomalyPlan;
use crate::config::GuardConfig;
use crate::detect::DetectPlan;
use crate::embed::{EmbedPlan, normalize_peak};
use crate::error::Result;
use crate::fft::FftProcessor;
use crate::frame::{FrameMode, FrameSpan, Framer, overlap_add};
use crate::payload::Payload;
use crate::signal::Signal;
use crate::verdict::DetectionReport;

/// Number of frames processed per rayon task.
const BATCH_SIZE: usize = 64;

/// Run `per_frame` over every span, one `FftProcessor` per batch, and
/// return the results in frame order.
fn map_frames<T, F>(spans: &[FrameSpan], frame_size: usize, per_frame: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(&mut FftProcessor, FrameSpan) -> Result<T> + Sync,
{
    let batches = spans
        .par_chunks(BATCH_SIZE)
        .map(|batch| -> Result<Vec<T>> {
            let mut fft = FftProcessor::new(frame_size)?;
            batch.iter().map(|&span| per_frame(&mut fft, span)).collect()
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(batches.into_iter().flatten().collect())
}

/// Parallel form of [`crate::protect`].
pub fn protect_parallel(signal: &Signal, config: &GuardConfig, payload: &Payload) -> Result<Signal> {
    let plan = EmbedPlan::new(signal, config, payload)?;
    let samples = signal.samples();
    let spans: Vec<FrameSpan> = Framer::new(plan.frame_size, samples.len(), FrameMode::Pad)
        .frames()
        .collect();

    let deltas = map_frames(&spans, plan.frame_size, |fft, span| {
        let mut delta = Vec::with_capacity(plan.frame_size);
        plan.frame_delta(fft, samples, span, &mut delta)?;
        Ok(delta)
    })?;

    let mut output = samples.to_vec();
    for (span, delta) in spans.iter().zip(&deltas) {
        overlap_add(&mut output, delta, &plan.window, span.offset);
    }
    normalize_peak(&mut output);
    tracing::info!(frames = spans.len(), "watermark embedded (parallel)");
    Ok(Signal::new(output, signal.sample_rate()))
}

/// Parallel form of [`crate::verify`].
pub fn verify_parallel(signal: &Signal, config: &GuardConfig) -> Result<DetectionReport> {
    let samples = signal.samples();

    let detect = DetectPlan::new(signal, config)?;
    let spans: Vec<FrameSpan> = detect.framer(samples.len()).frames().collect();
    let readings = map_frames(&spans, detect.frame_size, |fft, span| {
        detect.read_frame(fft, samples, span)
    })?;
    let watermark = detect.conclude(&readings);

    let scorer = AnomalyPlan::new(signal, config)?;
    let spectra = map_frames(&spans, scorer.frame_size, |fft, span| {
        scorer.spectrum(fft, samples, span)
    })?;
    let anomaly = scorer.conclude(&spectra);

    let report = DetectionReport::new(watermark, anomaly);
    tracing::info!(
        verdict = %report.verdict,
        confidence = report.confidence,
        anomaly_score = report.anomaly_score,
        "verification finished (parallel)"
    );
    Ok(report)
}
