use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use voiceguard_core::{GuardConfig, Payload, Signal};

const SAMPLE_RATE: u32 = 16000;

fn gaussian_noise_signal(num_samples: usize) -> Signal {
    let mut state = 0x1234_5678u32;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        (state as f32 / u32::MAX as f32).max(1e-10)
    };
    let samples = (0..num_samples)
        .map(|_| {
            let (u1, u2) = (next(), next());
            0.2 * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
        })
        .collect();
    Signal::new(samples, SAMPLE_RATE)
}

fn bench_protect(c: &mut Criterion) {
    let config = GuardConfig::with_key("bench");
    let payload = Payload::from_hex("deadbeef").unwrap();
    let audio = gaussian_noise_signal(SAMPLE_RATE as usize * 5);

    c.bench_function("protect_5s_16khz", |b| {
        b.iter(|| voiceguard_core::protect(black_box(&audio), &config, &payload).unwrap());
    });
}

fn bench_verify(c: &mut Criterion) {
    let config = GuardConfig::with_key("bench");
    let payload = Payload::from_hex("deadbeef").unwrap();
    let audio = gaussian_noise_signal(SAMPLE_RATE as usize * 5);
    let protected = voiceguard_core::protect(&audio, &config, &payload).unwrap();

    c.bench_function("verify_5s_16khz", |b| {
        b.iter(|| voiceguard_core::verify(black_box(&protected), &config).unwrap());
    });
}

fn bench_score_anomaly(c: &mut Criterion) {
    let config = GuardConfig::with_key("bench");
    let audio = gaussian_noise_signal(SAMPLE_RATE as usize * 5);

    c.bench_function("score_anomaly_5s_16khz", |b| {
        b.iter(|| voiceguard_core::score_anomaly(black_box(&audio), &config).unwrap());
    });
}

fn bench_fingerprint(c: &mut Criterion) {
    let audio = gaussian_noise_signal(SAMPLE_RATE as usize * 5);

    c.bench_function("fingerprint_5s_16khz", |b| {
        b.iter(|| voiceguard_core::fingerprint::extract(black_box(&audio)).unwrap());
    });
}

fn bench_fft_frame(c: &mut Criterion) {
    let config = GuardConfig::default();
    let audio = gaussian_noise_signal(config.frame_size);
    let window = voiceguard_core::frame::sqrt_hann_window(config.frame_size);

    c.bench_function("fft_analyze_synthesize_1024", |b| {
        let mut fft = voiceguard_core::fft::FftProcessor::new(config.frame_size).unwrap();
        b.iter(|| {
            fft.analyze(black_box(audio.samples()), &window).unwrap();
            black_box(fft.synthesize().unwrap());
        });
    });
}

#[cfg(feature = "parallel")]
fn bench_parallel_protect(c: &mut Criterion) {
    let config = GuardConfig::with_key("bench");
    let payload = Payload::from_hex("deadbeef").unwrap();
    let audio = gaussian_noise_signal(SAMPLE_RATE as usize * 5);

    c.bench_function("parallel_protect_5s_16khz", |b| {
        b.iter(|| voiceguard_core::protect_parallel(black_box(&audio), &config, &payload).unwrap());
    });
}

#[cfg(feature = "parallel")]
fn bench_parallel_verify(c: &mut Criterion) {
    let config = GuardConfig::with_key("bench");
    let payload = Payload::from_hex("deadbeef").unwrap();
    let audio = gaussian_noise_signal(SAMPLE_RATE as usize * 5);
    let protected = voiceguard_core::protect(&audio, &config, &payload).unwrap();

    c.bench_function("parallel_verify_5s_16khz", |b| {
        b.iter(|| voiceguard_core::verify_parallel(black_box(&protected), &config).unwrap());
    });
}

#[cfg(not(feature = "parallel"))]
criterion_group!(
    benches,
    bench_protect,
    bench_verify,
    bench_score_anomaly,
    bench_fingerprint,
    bench_fft_frame,
);

#[cfg(feature = "parallel")]
criterion_group!(
    benches,
    bench_protect,
    bench_verify,
    bench_score_anomaly,
    bench_fingerprint,
    bench_fft_frame,
    bench_parallel_protect,
    bench_parallel_verify,
);

criterion_main!(benches);
