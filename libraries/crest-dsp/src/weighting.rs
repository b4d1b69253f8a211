//! Frequency weighting filters
//!
//! Causal IIR realizations of the IEC 61672 A/B/C/D loudness curves and the
//! ITU-R BS.1770 K pre-filter, applied before energy estimation so windowed
//! RMS approximates perceived loudness. The A/B/C/D filters are built from
//! their analog pole/zero prototypes with the bilinear transform and
//! normalized to unity gain at 1 kHz; the K filter uses the standard
//! shelf + high-pass pair designed for the actual sample rate.

use crate::biquad::{Biquad, BiquadCoeffs};
use std::f64::consts::PI;

// IEC 61672 corner frequencies shared by the A/B/C curves
const F1: f64 = 20.598997;
const F2: f64 = 107.65265;
const F3: f64 = 737.86223;
const F4: f64 = 12194.217;
const F5: f64 = 158.5;

/// Frequency weighting curve selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Weighting {
    /// No weighting (flat)
    #[default]
    None,
    /// A-weighting (IEC 61672)
    A,
    /// B-weighting (IEC 61672)
    B,
    /// C-weighting (IEC 61672)
    C,
    /// D-weighting (IEC 537)
    D,
    /// K-weighting (ITU-R BS.1770)
    K,
}

impl Weighting {
    /// Parse from a command-line / settings string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" | "off" | "flat" => Some(Self::None),
            "a" => Some(Self::A),
            "b" => Some(Self::B),
            "c" => Some(Self::C),
            "d" => Some(Self::D),
            "k" => Some(Self::K),
            _ => None,
        }
    }

    /// String form for display and persistence
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::A => "a",
            Self::B => "b",
            Self::C => "c",
            Self::D => "d",
            Self::K => "k",
        }
    }
}

/// Cascade of biquad sections realizing one weighting curve
///
/// State is per-channel: call [`WeightingFilter::reset`] before switching to
/// another channel so every channel sees zero initial conditions.
pub struct WeightingFilter {
    sections: Vec<Biquad>,
    makeup: f32,
}

impl WeightingFilter {
    /// Design the filter for a curve at the given sample rate
    pub fn new(weighting: Weighting, sample_rate: u32) -> Self {
        debug_assert!(sample_rate > 0);
        let fs = f64::from(sample_rate);

        let (coeffs, normalize) = match weighting {
            Weighting::None => (Vec::new(), false),
            Weighting::A => (a_weighting(fs), true),
            Weighting::B => (b_weighting(fs), true),
            Weighting::C => (c_weighting(fs), true),
            Weighting::D => (d_weighting(fs), true),
            Weighting::K => (k_weighting(fs), false),
        };

        // Pin the response to unity at 1 kHz; the analog prototypes carry
        // arbitrary constant factors that the transform does not preserve.
        let makeup = if normalize {
            let mag: f64 = coeffs
                .iter()
                .map(|c| c.magnitude_at(1000.0, fs))
                .product();
            if mag > 0.0 {
                (1.0 / mag) as f32
            } else {
                1.0
            }
        } else {
            1.0
        };

        Self {
            sections: coeffs.into_iter().map(Biquad::new).collect(),
            makeup,
        }
    }

    /// Filter `src` into `dst` (lengths must match)
    pub fn process(&mut self, dst: &mut [f32], src: &[f32]) {
        debug_assert_eq!(dst.len(), src.len());
        for (d, &s) in dst.iter_mut().zip(src.iter()) {
            *d = self.tick(s);
        }
    }

    /// Filter a buffer in place
    pub fn process_inplace(&mut self, buf: &mut [f32]) {
        for s in buf.iter_mut() {
            *s = self.tick(*s);
        }
    }

    /// Process one sample through the cascade
    #[inline]
    pub fn tick(&mut self, x: f32) -> f32 {
        let mut y = x;
        for section in &mut self.sections {
            y = section.tick(y);
        }
        y * self.makeup
    }

    /// Clear all section states (zero initial conditions)
    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }

    /// True when the filter passes the signal through untouched
    pub fn is_transparent(&self) -> bool {
        self.sections.is_empty()
    }
}

fn w(f: f64) -> f64 {
    2.0 * PI * f
}

/// A(s) = s⁴ / [(s+w1)²(s+w2)(s+w3)(s+w4)²], constant factor folded into
/// the 1 kHz normalization
fn a_weighting(fs: f64) -> Vec<BiquadCoeffs> {
    let (w1, w2, w3, w4) = (w(F1), w(F2), w(F3), w(F4));
    vec![
        BiquadCoeffs::bilinear([0.0, 0.0, 1.0], [w1 * w1, 2.0 * w1, 1.0], fs),
        BiquadCoeffs::bilinear([0.0, 0.0, 1.0], [w2 * w3, w2 + w3, 1.0], fs),
        BiquadCoeffs::bilinear([w4 * w4, 0.0, 0.0], [w4 * w4, 2.0 * w4, 1.0], fs),
    ]
}

/// B(s) = s³ / [(s+w1)²(s+w5)(s+w4)²]
fn b_weighting(fs: f64) -> Vec<BiquadCoeffs> {
    let (w1, w4, w5) = (w(F1), w(F4), w(F5));
    vec![
        BiquadCoeffs::bilinear([0.0, 0.0, 1.0], [w1 * w1, 2.0 * w1, 1.0], fs),
        BiquadCoeffs::bilinear([0.0, 1.0, 0.0], [w5 * w4, w5 + w4, 1.0], fs),
        BiquadCoeffs::bilinear([w4, 0.0, 0.0], [w4, 1.0, 0.0], fs),
    ]
}

/// C(s) = s² / [(s+w1)²(s+w4)²]
fn c_weighting(fs: f64) -> Vec<BiquadCoeffs> {
    let (w1, w4) = (w(F1), w(F4));
    vec![
        BiquadCoeffs::bilinear([0.0, 0.0, 1.0], [w1 * w1, 2.0 * w1, 1.0], fs),
        BiquadCoeffs::bilinear([w4 * w4, 0.0, 0.0], [w4 * w4, 2.0 * w4, 1.0], fs),
    ]
}

/// D(s) = s·(s² + 6532·s + 4.0975e7) /
///        [(s+1776.3)(s+7288.5)(s² + 21514·s + 3.8836e8)]
fn d_weighting(fs: f64) -> Vec<BiquadCoeffs> {
    let (p1, p2) = (1776.3, 7288.5);
    vec![
        BiquadCoeffs::bilinear([0.0, 1.0, 0.0], [p1 * p2, p1 + p2, 1.0], fs),
        BiquadCoeffs::bilinear(
            [4.0975e7, 6532.0, 1.0],
            [3.8836e8, 21514.0, 1.0],
            fs,
        ),
    ]
}

/// BS.1770 K pre-filter: +4 dB high shelf at ~1682 Hz followed by a
/// high-pass at ~38 Hz, both designed for the actual sample rate
fn k_weighting(fs: f64) -> Vec<BiquadCoeffs> {
    // Stage 1: spherical-head high shelf
    let f0 = 1681.974450955533;
    let gain_db = 3.999843853973347;
    let q = 0.7071752369554196;

    let k = (PI * f0 / fs).tan();
    let vh = 10.0_f64.powf(gain_db / 20.0);
    let vb = vh.powf(0.4996667741545416);
    let a0 = 1.0 + k / q + k * k;
    let shelf = BiquadCoeffs {
        b0: (vh + vb * k / q + k * k) / a0,
        b1: 2.0 * (k * k - vh) / a0,
        b2: (vh - vb * k / q + k * k) / a0,
        a1: 2.0 * (k * k - 1.0) / a0,
        a2: (1.0 - k / q + k * k) / a0,
    };

    // Stage 2: RLB high-pass
    let f0 = 38.13547087602444;
    let q = 0.5003270373238773;

    let k = (PI * f0 / fs).tan();
    let a0 = 1.0 + k / q + k * k;
    let highpass = BiquadCoeffs {
        b0: 1.0,
        b1: -2.0,
        b2: 1.0,
        a1: 2.0 * (k * k - 1.0) / a0,
        a2: (1.0 - k / q + k * k) / a0,
    };

    vec![shelf, highpass]
}
