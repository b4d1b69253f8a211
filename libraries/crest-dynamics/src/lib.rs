//! Dynamics analysis and correction for the Crest toolkit
//!
//! This crate provides the core streaming-numeric algorithms:
//! - Sliding energy estimators (RMS, mean, one-sided RMS, positive/negative
//!   balance) with the `input + window` output convention
//! - A peak-based envelope estimator with cubic-blend smoothing
//! - Zero-crossing region segmentation with adaptive peak thresholds, and a
//!   hard region gain clamp
//! - The amplitude smasher: outlier-peak suppression with a continuous
//!   interpolated gain trajectory
//! - The multi-pass upward-compression pipeline and a conditional peak
//!   normalizer
//!
//! # Data flow
//!
//! ```text
//! signal ──► weighting ──► energy / envelope ──► region & peak analysis
//!                                                        │
//!        output ◄── normalizer ◄── smasher ◄── gain shaping (multi-pass)
//! ```
//!
//! Everything operates on complete in-memory [`Sample`](crest_core::Sample)
//! buffers; channels are processed independently.

#![deny(unsafe_code)]

mod envelope;
mod gain;
mod median;
mod normalizer;
mod pipeline;
mod regions;
mod rms;
mod smasher;
mod window;

pub use envelope::estimate_envelope;
pub use gain::{apply_gain, calc_deviation, calc_gain_adjust};
pub use median::median_gain;
pub use normalizer::{normalize, NormalizeMode};
pub use pipeline::{adjust_gain, reference_levels, run_pipeline, PipelineConfig};
pub use regions::{clamp_regions, find_peaks, Peak, Region};
pub use rms::{
    apply_rms_balance, apply_weight, estimate_average, estimate_partial_rms, estimate_rms,
    estimate_rms_balance, Polarity, RmsBalance,
};
pub use smasher::smash_amplitude;
