//! Conditional peak normalization

use crest_core::Sample;
use tracing::debug;

/// Peaks below this level count as silence; nothing is rescaled
const SILENCE_FLOOR: f32 = 1e-6;

/// When to rescale relative to the target gain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalizeMode {
    /// Never touch the buffer
    #[default]
    None,
    /// Rescale only when the peak is above the target (attenuate)
    Above,
    /// Rescale only when the peak is below the target (amplify)
    Below,
    /// Always rescale to the target
    Always,
}

impl NormalizeMode {
    /// Parse from a command-line / settings string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" | "off" => Some(Self::None),
            "above" => Some(Self::Above),
            "below" => Some(Self::Below),
            "always" => Some(Self::Always),
            _ => None,
        }
    }

    /// String form for display and persistence
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Above => "above",
            Self::Below => "below",
            Self::Always => "always",
        }
    }
}

/// Rescale the buffer so its absolute peak matches `gain`, subject to the
/// mode's condition
///
/// Operates in place across all channels with one common factor so the
/// channel balance is preserved. Silent buffers are never touched.
pub fn normalize(sample: &mut Sample, gain: f32, mode: NormalizeMode) {
    if mode == NormalizeMode::None {
        return;
    }

    let peak = sample.peak();
    if peak < SILENCE_FLOOR {
        return;
    }

    match mode {
        NormalizeMode::Below if peak >= gain => return,
        NormalizeMode::Above if peak <= gain => return,
        _ => {}
    }

    let k = gain / peak;
    debug!(peak, gain, factor = k, "normalizing");
    for ch in sample.iter_channels_mut() {
        for v in ch.iter_mut() {
            *v *= k;
        }
    }
}
