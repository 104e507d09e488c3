use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use voiceguard_core::fingerprint::{self, VoiceFingerprint};
use voiceguard_core::{GuardConfig, Payload, Signal, Verdict};

#[derive(Parser)]
#[command(name = "voiceguard", about = "Audio watermarking and deepfake screening", version)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    /// Log pipeline details (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Configuration sources, applied in order: defaults, `--config` file,
/// `--profile`, then individual flags.
#[derive(Args)]
struct Settings {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Secret key passphrase
    #[arg(short, long, global = true)]
    key: Option<String>,

    /// Parameter profile
    #[arg(long, value_enum, global = true)]
    profile: Option<Profile>,

    /// Embedding strength (relative magnitude perturbation)
    #[arg(long, global = true)]
    strength: Option<f32>,

    /// FFT frame size (power of 2)
    #[arg(long, global = true)]
    frame_size: Option<usize>,

    /// Lower edge of the embedding band in Hz
    #[arg(long, global = true)]
    band_low: Option<f32>,

    /// Upper edge of the embedding band in Hz
    #[arg(long, global = true)]
    band_high: Option<f32>,

    /// Per-frame correlation needed to count a frame as matched
    #[arg(long, global = true)]
    detection_threshold: Option<f32>,

    /// Score at or above which audio is flagged as synthetic
    #[arg(long, global = true)]
    anomaly_threshold: Option<f32>,
}

#[derive(Subcommand)]
enum Command {
    /// Embed a watermark into a WAV file
    Protect {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file (32-bit float mono)
        #[arg(short, long)]
        output: PathBuf,

        /// Payload as a hex string, zero-padded to the configured bit count
        #[arg(short, long, default_value = "")]
        payload: String,
    },
    /// Check a WAV file for the watermark and for synthesis artifacts
    Verify {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Score a WAV file for synthesis artifacts only (no key needed)
    Score {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Extract a voice fingerprint, optionally comparing it to another
    Fingerprint {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// WAV file or saved fingerprint (.toml) to compare against
        #[arg(long)]
        compare: Option<PathBuf>,

        /// Save the fingerprint as TOML
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Profile {
    /// Narrowband speech channels (300-3400 Hz)
    Telephony,
    /// Stronger embedding with more redundancy
    Robust,
}

impl Profile {
    fn apply(self, config: &mut GuardConfig) {
        match self {
            Profile::Telephony => {
                config.embed_band_low_hz = 300.0;
                config.embed_band_high_hz = 3400.0;
                config.embed_strength = 0.6;
            }
            Profile::Robust => {
                config.embed_strength = 0.7;
                config.redundancy = 5;
                config.min_frames_detected = 0.4;
            }
        }
    }
}

impl Settings {
    fn resolve(&self) -> Result<GuardConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => GuardConfig::default(),
        };
        if let Some(profile) = self.profile {
            profile.apply(&mut config);
        }
        if let Some(key) = &self.key {
            config.secret_key = key.as_bytes().to_vec();
        }
        if let Some(strength) = self.strength {
            config.embed_strength = strength;
        }
        if let Some(frame_size) = self.frame_size {
            config.frame_size = frame_size;
        }
        if let Some(low) = self.band_low {
            config.embed_band_low_hz = low;
        }
        if let Some(high) = self.band_high {
            config.embed_band_high_hz = high;
        }
        if let Some(threshold) = self.detection_threshold {
            config.detection_threshold = threshold;
        }
        if let Some(threshold) = self.anomaly_threshold {
            config.anomaly_threshold = threshold;
        }
        Ok(config)
    }
}

fn load_config(path: &Path) -> Result<GuardConfig, Box<dyn std::error::Error>> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read config {}: {e}", path.display()))?;
    let config: GuardConfig = toml::from_str(&toml_str)
        .map_err(|e| format!("invalid config {}: {e}", path.display()))?;
    tracing::debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "voiceguard=debug,voiceguard_core=debug"
    } else {
        "voiceguard=info,voiceguard_core=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Read a WAV file as mono f32. Only the first channel of multi-channel
/// input is used.
fn read_wav(path: &Path) -> Result<Signal, Box<dyn std::error::Error>> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    if spec.channels != 1 {
        tracing::warn!(
            channels = spec.channels,
            "multi-channel input, only the first channel will be used"
        );
    }

    let mut samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .collect::<Result<Vec<i32>, _>>()?
                .into_iter()
                .map(|s| s as f32 / max)
                .collect()
        }
    };

    if spec.channels > 1 {
        samples = samples
            .chunks(spec.channels as usize)
            .map(|c| c[0])
            .collect();
    }

    tracing::debug!(
        path = %path.display(),
        samples = samples.len(),
        sample_rate = spec.sample_rate,
        "audio loaded"
    );
    Ok(Signal::new(samples, spec.sample_rate))
}

fn write_wav(path: &Path, signal: &Signal) -> Result<(), Box<dyn std::error::Error>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: signal.sample_rate(),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in signal.samples() {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

fn load_fingerprint(path: &Path) -> Result<VoiceFingerprint, Box<dyn std::error::Error>> {
    if path.extension().is_some_and(|ext| ext == "toml") {
        let toml_str = std::fs::read_to_string(path)?;
        return Ok(toml::from_str(&toml_str)?);
    }
    Ok(fingerprint::extract(&read_wav(path)?)?)
}

#[derive(Serialize)]
struct ProtectSummary {
    output: String,
    samples: usize,
    sample_rate: u32,
    duration_secs: f32,
    payload: Payload,
    peak: f32,
}

fn print_toml<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    print!("{}", toml::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = cli.settings.resolve()?;

    match cli.command {
        Command::Protect {
            input,
            output,
            payload,
        } => {
            let payload = Payload::from_hex(&payload)?;
            let signal = read_wav(&input)?;
            tracing::info!(
                input = %input.display(),
                duration_secs = signal.duration_secs(),
                "protecting"
            );

            let protected = voiceguard_core::protect(&signal, &config, &payload)?;
            write_wav(&output, &protected)?;

            print_toml(&ProtectSummary {
                output: output.display().to_string(),
                samples: protected.len(),
                sample_rate: protected.sample_rate(),
                duration_secs: protected.duration_secs(),
                payload,
                peak: protected.peak(),
            })?;
        }
        Command::Verify { input } => {
            let signal = read_wav(&input)?;
            let report = voiceguard_core::verify(&signal, &config)?;
            print_toml(&report)?;
            if report.verdict != Verdict::Authentic {
                std::process::exit(1);
            }
        }
        Command::Score { input } => {
            let signal = read_wav(&input)?;
            let report = voiceguard_core::score_anomaly(&signal, &config)?;
            print_toml(&report)?;
        }
        Command::Fingerprint {
            input,
            compare,
            save,
        } => {
            let stored = fingerprint::extract(&read_wav(&input)?)?;
            if let Some(path) = &save {
                std::fs::write(path, toml::to_string_pretty(&stored)?)?;
                tracing::info!(path = %path.display(), "fingerprint saved");
            }
            match compare {
                Some(path) => {
                    let candidate = load_fingerprint(&path)?;
                    print_toml(&fingerprint::compare(&stored, &candidate))?;
                }
                None if save.is_none() => print_toml(&stored)?,
                None => {}
            }
        }
        Command::Config => {
            print_toml(&config)?;
        }
    }

    Ok(())
}
