//! Behavioural properties that should hold for any reasonable input.

mod common;

use voiceguard_core::codec::{self, ErrorCorrection, Repetition, Symbol};
use voiceguard_core::{GuardConfig, Payload, Signal};

const SAMPLE_RATE: u32 = 16000;

fn payload_from_seed(seed: u32) -> Payload {
    let mut state = seed.max(1);
    let bytes: Vec<u8> = (0..4)
        .map(|_| (common::xorshift32(&mut state) >> 24) as u8)
        .collect();
    Payload::from_bytes(&bytes)
}

#[test]
fn round_trip_across_seeds() {
    let config = GuardConfig::with_key("round-trip");
    for seed in [1u32, 17, 4242, 0xBEEF] {
        let signal = Signal::new(
            common::gaussian_noise(SAMPLE_RATE as usize * 4, 0.25, seed),
            SAMPLE_RATE,
        );
        let payload = payload_from_seed(seed);
        let protected = voiceguard_core::protect(&signal, &config, &payload).unwrap();

        let report = voiceguard_core::verify_watermark(&protected, &config).unwrap();
        assert!(report.watermark_detected, "seed {seed}: confidence {}", report.confidence);
        assert_eq!(report.payload, Some(payload), "seed {seed}");
        assert!(report.mean_correlation > 0.2, "seed {seed}: {}", report.mean_correlation);
    }
}

#[test]
fn foreign_keys_never_detect() {
    let signal = Signal::new(common::gaussian_noise(SAMPLE_RATE as usize * 4, 0.3, 3), SAMPLE_RATE);
    let protected =
        voiceguard_core::protect(&signal, &GuardConfig::with_key("owner"), &Payload::empty())
            .unwrap();

    for other in ["k2", "owner ", "OWNER", "someone-else"] {
        let report =
            voiceguard_core::verify_watermark(&protected, &GuardConfig::with_key(other)).unwrap();
        assert!(!report.watermark_detected, "key {other:?}");
        assert!(report.confidence < 0.2, "key {other:?}: {}", report.confidence);
    }
}

#[test]
fn repetition_code_survives_one_flip_per_group() {
    let payload = Payload::from_hex("a5c3").unwrap();
    let mut coded = codec::encode(payload.bits(), 3);

    // Flip a different position in each group of three.
    for (group, chunk) in coded.chunks_mut(3).enumerate() {
        chunk[group % 3] = !chunk[group % 3];
    }

    let (bits, corrected) = codec::decode(&coded, 3);
    assert_eq!(bits, payload.bits());
    assert_eq!(corrected, payload.len());
}

#[test]
fn erasures_abstain_from_voting() {
    let code = Repetition::new(3);
    let symbols = [
        Symbol::Reliable(true),
        Symbol::Erased(Some(false)),
        Symbol::Erased(Some(false)),
        Symbol::Erased(Some(true)),
        Symbol::Erased(Some(true)),
        Symbol::Erased(Some(false)),
    ];
    let decoded = code.decode_symbols(&symbols);
    assert_eq!(decoded.bits, vec![true, true]);
    assert_eq!(decoded.uncorrectable, 0);
}

#[test]
fn leading_seventy_percent_still_detects() {
    let config = GuardConfig::with_key("k1");
    let signal = Signal::new(common::gaussian_noise(SAMPLE_RATE as usize * 5, 0.3, 11), SAMPLE_RATE);
    let protected = voiceguard_core::protect(&signal, &config, &Payload::empty()).unwrap();

    let head = protected.truncated(0.7);
    let report = voiceguard_core::verify_watermark(&head, &config).unwrap();
    assert!(report.watermark_detected, "confidence {}", report.confidence);
    assert!(report.frames_analyzed < 155);
}

#[test]
fn anomaly_score_grows_with_synthetic_share() {
    let config = GuardConfig::with_key("k1");
    let len = SAMPLE_RATE as usize * 2;
    let voice = common::voice_like(len, SAMPLE_RATE, 7);
    let synthetic = common::pulse_train(len, 512, 9);

    let scores: Vec<f32> = [0.0f32, 0.4, 0.8, 1.6, 3.2, 6.4]
        .iter()
        .map(|&lambda| {
            let mixed: Vec<f32> = voice
                .iter()
                .zip(&synthetic)
                .map(|(v, s)| v + lambda * s)
                .collect();
            voiceguard_core::score_anomaly(&Signal::new(mixed, SAMPLE_RATE), &config)
                .unwrap()
                .score
        })
        .collect();

    for pair in scores.windows(2) {
        assert!(pair[1] > pair[0], "scores not increasing: {scores:?}");
    }
    assert!(scores[0] < config.anomaly_threshold, "{scores:?}");
    assert!(scores[5] >= config.anomaly_threshold, "{scores:?}");
}

#[test]
fn protect_and_verify_are_deterministic() {
    let config = GuardConfig::with_key("k1");
    let signal = Signal::new(common::voice_like(SAMPLE_RATE as usize * 4, SAMPLE_RATE, 5), SAMPLE_RATE);
    let payload = Payload::from_hex("0123abcd").unwrap();

    let first = voiceguard_core::protect(&signal, &config, &payload).unwrap();
    let second = voiceguard_core::protect(&signal, &config, &payload).unwrap();
    assert_eq!(first, second);

    let a = voiceguard_core::verify(&first, &config).unwrap();
    let b = voiceguard_core::verify(&first, &config).unwrap();
    assert_eq!(a, b);
}

#[test]
fn embedding_stays_quiet_relative_to_signal() {
    let config = GuardConfig::with_key("k1");
    let signal = Signal::new(common::voice_like(SAMPLE_RATE as usize * 4, SAMPLE_RATE, 5), SAMPLE_RATE);
    let protected = voiceguard_core::protect(&signal, &config, &Payload::empty()).unwrap();

    let residual: Vec<f32> = protected
        .samples()
        .iter()
        .zip(signal.samples())
        .map(|(p, s)| p - s)
        .collect();
    let ratio = common::rms(&residual) / common::rms(signal.samples());
    assert!(ratio > 0.0 && ratio < 0.6, "residual ratio {ratio}");
}
