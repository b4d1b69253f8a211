//! Shared foundation for the Crest dynamics-correction toolkit
//!
//! This crate provides:
//! - [`Sample`] — the planar multichannel f32 buffer every processing stage
//!   exchanges
//! - [`CrestError`] — the common error taxonomy (allocation failure, channel
//!   count mismatch, bad arguments)
//! - [`units`] — dB/linear and milliseconds/samples conversions

#![deny(unsafe_code)]

mod error;
mod sample;
pub mod units;

pub use error::{CrestError, Result};
pub use sample::Sample;
