//! Multi-pass adaptive gain adjustment
//!
//! Drives N sequential passes of upward compression. The reference level of
//! every channel is fixed once, from a long-window weighted RMS of the
//! unmodified input; each pass re-estimates a short-window envelope of its
//! own source, converts it to a per-sample gain through the curve engine,
//! and multiplies. Passes chain strictly; channels are independent within a
//! pass.

use crate::gain::apply_gain;
use crate::rms::estimate_rms;
use crest_core::units::millis_to_samples;
use crest_core::{CrestError, Result, Sample};
use crest_dsp::{GainCurve, Weighting};
use tracing::debug;

/// Window length of the fixed reference estimate, in milliseconds
const REFERENCE_WINDOW_MS: f32 = 400.0;

/// Settings for the multi-pass driver
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Number of sequential compression passes
    pub passes: usize,
    /// Short-window envelope length in milliseconds
    pub reactivity_ms: f32,
    /// Dynamic range of the compressor in dB
    pub range_db: f32,
    /// Soft-knee width in dB
    pub knee_db: f32,
    /// Weighting curve applied before energy estimation
    pub weighting: Weighting,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            passes: 1,
            reactivity_ms: 40.0,
            range_db: 6.0,
            knee_db: 3.0,
            weighting: Weighting::None,
        }
    }
}

/// Fixed per-channel reference levels
///
/// The peak of a ≈400 ms weighted RMS estimate of the unmodified input,
/// one value per channel. Computed once and reused unchanged across all
/// passes.
///
/// # Errors
/// Fails when the estimate buffer cannot be allocated.
pub fn reference_levels(src: &Sample, weighting: Weighting) -> Result<Vec<f32>> {
    let period = millis_to_samples(src.sample_rate(), REFERENCE_WINDOW_MS) | 1;
    let rms = estimate_rms(src, weighting, period)?;

    Ok((0..rms.channels())
        .map(|ch| {
            rms.channel(ch)
                .iter()
                .fold(0.0_f32, |acc, &v| acc.max(v.abs()))
        })
        .collect())
}

/// One pass of envelope-driven gain adjustment
///
/// `envelope` must be realigned with `src` (settling head trimmed) before
/// the call. Returns the adjusted signal and the gain stream that produced
/// it; both are `min(src.len(), envelope.len())` samples long.
///
/// # Errors
/// Fails when the channel counts differ, when `thresholds` does not carry
/// one level per channel, or when an output buffer cannot be allocated.
pub fn adjust_gain(
    src: &Sample,
    envelope: &Sample,
    thresholds: &[f32],
    range_db: f32,
    knee_db: f32,
) -> Result<(Sample, Sample)> {
    if src.channels() != envelope.channels() {
        return Err(CrestError::ChannelCountMismatch {
            left: src.channels(),
            right: envelope.channels(),
        });
    }
    if thresholds.len() != src.channels() {
        return Err(CrestError::BadArguments(
            "one reference level per channel required",
        ));
    }

    let count = src.len().min(envelope.len());
    let mut gain = Sample::new(src.channels(), count, src.sample_rate())?;

    for ch in 0..src.channels() {
        let mut curve = GainCurve::new(src.sample_rate(), thresholds[ch], range_db, knee_db);
        curve.compute_gain(gain.channel_mut(ch), &envelope.channel(ch)[..count]);
    }

    let out = apply_gain(src, &gain)?;
    Ok((out, gain))
}

/// Run the full multi-pass pipeline
///
/// # Errors
/// Fails on a zero pass count or when any intermediate buffer cannot be
/// allocated.
pub fn run_pipeline(src: &Sample, config: &PipelineConfig) -> Result<Sample> {
    if config.passes == 0 {
        return Err(CrestError::BadArguments("at least one pass required"));
    }

    let thresholds = reference_levels(src, config.weighting)?;
    let period = millis_to_samples(src.sample_rate(), config.reactivity_ms) | 1;

    let mut current = src.clone();
    for pass in 0..config.passes {
        let mut envelope = estimate_rms(&current, config.weighting, period)?;
        // Realign the envelope with its source: drop the estimator's
        // half-window settling head
        envelope.truncate_front(period / 2);

        let (out, _gain) = adjust_gain(
            &current,
            &envelope,
            &thresholds,
            config.range_db,
            config.knee_db,
        )?;
        debug!(
            pass,
            period,
            length = out.len(),
            "gain adjustment pass complete"
        );
        current = out;
    }

    Ok(current)
}
