//! crest - offline audio dynamics correction
//!
//! Loads an audio file, runs the multi-pass upward-compression pipeline,
//! optionally suppresses outlier peaks and normalizes, and writes the
//! result as 32-bit float WAV.

mod io;

use anyhow::{anyhow, bail};
use clap::Parser;
use crest_core::units::db_to_gain;
use crest_dsp::Weighting;
use crest_dynamics::{normalize, run_pipeline, smash_amplitude, NormalizeMode, PipelineConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "crest")]
#[command(about = "Correct the dynamics of a recorded audio clip", long_about = None)]
struct Cli {
    /// The path to the input file
    #[arg(short = 'i', long = "in-file")]
    in_file: PathBuf,

    /// The path to the output file
    #[arg(short = 'o', long = "out-file")]
    out_file: PathBuf,

    /// Sample rate of the output (processed) file, optional
    #[arg(long = "srate")]
    srate: Option<u32>,

    /// Number of passes
    #[arg(long = "num-passes", default_value_t = 1)]
    num_passes: usize,

    /// Reactivity of the compressor (in ms)
    #[arg(short = 'r', long = "reactivity", default_value_t = 40.0)]
    reactivity: f32,

    /// Dynamic range of the compressor (in dB)
    #[arg(long = "dynamic-range", default_value_t = 6.0)]
    dynamic_range: f32,

    /// Knee of the compressor (in dB)
    #[arg(short = 'k', long = "knee", default_value_t = 3.0)]
    knee: f32,

    /// Frequency weighting function (none, a, b, c, d, k)
    #[arg(short = 'w', long = "weighting", default_value = "none")]
    weighting: String,

    /// Normalization mode (none, above, below, always)
    #[arg(short = 'n', long = "normalize", default_value = "none")]
    normalize: String,

    /// Normalization peak gain (in dB)
    #[arg(long = "norm-gain", default_value_t = 0.0)]
    norm_gain: f32,

    /// The threshold above which all peaks are eliminated (in dB, off if
    /// not positive)
    #[arg(long = "eliminate-peaks")]
    eliminate_peaks: Option<f32>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    if cli.num_passes == 0 {
        bail!("invalid number of passes, should be positive");
    }
    if cli.reactivity < 0.0 {
        bail!("bad reactivity value, should be non-negative");
    }
    if cli.dynamic_range <= 0.0 {
        bail!("bad dynamic range value, should be positive");
    }
    if cli.knee < 0.0 {
        bail!("bad knee value, should be non-negative");
    }

    let weighting = Weighting::from_str(&cli.weighting)
        .ok_or_else(|| anyhow!("unknown weighting function '{}'", cli.weighting))?;
    let norm_mode = NormalizeMode::from_str(&cli.normalize)
        .ok_or_else(|| anyhow!("unknown normalization mode '{}'", cli.normalize))?;

    // Load and optionally resample the input
    let mut input = io::load_audio_file(&cli.in_file)?;
    if let Some(rate) = cli.srate {
        if rate == 0 {
            bail!("bad output sample rate");
        }
        input = io::resample(&input, rate)?;
    }

    // Multi-pass gain adjustment
    let config = PipelineConfig {
        passes: cli.num_passes,
        reactivity_ms: cli.reactivity,
        range_db: cli.dynamic_range,
        knee_db: cli.knee,
        weighting,
    };
    info!(
        passes = config.passes,
        reactivity_ms = config.reactivity_ms,
        range_db = config.range_db,
        knee_db = config.knee_db,
        weighting = weighting.as_str(),
        "adjusting dynamics"
    );
    let mut out = run_pipeline(&input, &config)?;

    // Peak suppression, enabled by a positive dB threshold
    if let Some(threshold_db) = cli.eliminate_peaks {
        let threshold = db_to_gain(threshold_db);
        if threshold > 1.0 {
            info!(threshold_db, "eliminating peaks");
            out = smash_amplitude(&out, threshold)?;
        }
    }

    normalize(&mut out, db_to_gain(cli.norm_gain), norm_mode);

    io::save_audio_file(&cli.out_file, &out)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let cli = Cli::parse_from(["crest", "-i", "in.wav", "-o", "out.wav"]);
        assert_eq!(cli.num_passes, 1);
        assert_eq!(cli.reactivity, 40.0);
        assert_eq!(cli.dynamic_range, 6.0);
        assert_eq!(cli.knee, 3.0);
        assert_eq!(cli.weighting, "none");
        assert_eq!(cli.normalize, "none");
        assert_eq!(cli.norm_gain, 0.0);
        assert!(cli.eliminate_peaks.is_none());
        assert!(cli.srate.is_none());
    }

    #[test]
    fn input_and_output_are_required() {
        assert!(Cli::try_parse_from(["crest", "-i", "in.wav"]).is_err());
        assert!(Cli::try_parse_from(["crest", "-o", "out.wav"]).is_err());
    }
}
