//! Numeric services for the Crest dynamics-correction toolkit
//!
//! This crate provides the two opaque engines the core algorithms call
//! into:
//! - [`WeightingFilter`] — causal loudness-weighting filters
//!   (none/A/B/C/D/K) with zero initial state
//! - [`GainCurve`] — the envelope-follower/curve engine converting a
//!   loudness envelope into a per-sample upward-compression gain
//!
//! Both operate on complete in-memory buffers, one channel at a time.

#![deny(unsafe_code)]

mod biquad;
mod gain_curve;
mod weighting;

pub use biquad::{Biquad, BiquadCoeffs};
pub use gain_curve::GainCurve;
pub use weighting::{Weighting, WeightingFilter};
