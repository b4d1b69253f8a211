//! Peak-based envelope estimation
//!
//! Tracks the true extrema of the waveform instead of its windowed energy:
//! per block of `period` samples the strongest positive maximum and
//! strongest negative minimum are recorded as sparse control points, each
//! polarity track is smoothed with a zero-slope cubic blend, and the
//! midpoint of the two smoothed tracks is subtracted from the signal to
//! remove slow amplitude ramps.

use crest_core::{CrestError, Result, Sample};
use crest_dsp::{Weighting, WeightingFilter};

/// Cubic blend between `a` and `b` with zero slope at both endpoints
///
/// `t` runs over `[0, 1]`; the curve never overshoots its endpoints.
#[inline]
pub(crate) fn hermite_step(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t * t * (3.0 - 2.0 * t)
}

/// Smooth a sparse track of recorded extrema into a continuous envelope
///
/// `src` holds recorded values at their positions and zero everywhere else
/// ("no data"). Consecutive recorded points are bridged with the cubic
/// blend; a trailing gap (or an entirely empty track) extends the last
/// known value to the buffer end.
fn smooth_sparse_track(dst: &mut [f32], src: &[f32]) {
    debug_assert_eq!(dst.len(), src.len());
    let count = src.len();
    let mut prev = 0_usize;

    for i in 0..count {
        let s = src[i];
        if s == 0.0 || i <= prev {
            continue;
        }

        let from = src[prev];
        let span = (i - prev) as f32;
        for k in prev..i {
            dst[k] = hermite_step(from, s, (k - prev) as f32 / span);
        }
        prev = i;
    }

    // Trailing gap: hold the last recorded value
    for slot in dst[prev..].iter_mut() {
        *slot = src[prev];
    }
}

/// Index of the maximum value in `buf` (first occurrence)
fn max_index(buf: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in buf.iter().enumerate() {
        if v > buf[best] {
            best = i;
        }
    }
    best
}

/// Index of the minimum value in `buf` (first occurrence)
fn min_index(buf: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in buf.iter().enumerate() {
        if v < buf[best] {
            best = i;
        }
    }
    best
}

/// Estimate and subtract the peak-tracked amplitude envelope
///
/// Returns the de-ramped signal, aligned sample-for-sample with the input.
///
/// # Errors
/// Fails on a zero block length or when the output buffer cannot be
/// allocated.
pub fn estimate_envelope(src: &Sample, weighting: Weighting, period: usize) -> Result<Sample> {
    if period == 0 {
        return Err(CrestError::BadArguments("envelope block length must be non-zero"));
    }

    let slength = src.len();
    // Pad to a whole number of blocks so every block is fully populated
    let dlength = slength + (period - slength % period) % period;
    let mut out = Sample::new(src.channels(), slength, src.sample_rate())?;
    let mut filter = WeightingFilter::new(weighting, src.sample_rate());

    for ch in 0..src.channels() {
        let sbuf = src.channel(ch);

        filter.reset();
        let mut weighted = vec![0.0_f32; dlength];
        let (head, tail) = weighted.split_at_mut(slength);
        filter.process(head, sbuf);
        for slot in tail.iter_mut() {
            *slot = filter.tick(0.0);
        }

        // Sparse per-block extremum tracks
        let mut ppeak = vec![0.0_f32; dlength];
        let mut npeak = vec![0.0_f32; dlength];
        for (b, block) in weighted.chunks(period).enumerate() {
            let base = b * period;
            let imin = min_index(block);
            let imax = max_index(block);
            if block[imin] < 0.0 {
                npeak[base + imin] = block[imin];
            }
            if block[imax] > 0.0 {
                ppeak[base + imax] = block[imax];
            }
        }

        let mut psmooth = vec![0.0_f32; dlength];
        let mut nsmooth = vec![0.0_f32; dlength];
        smooth_sparse_track(&mut psmooth, &ppeak);
        smooth_sparse_track(&mut nsmooth, &npeak);

        // De-ramp: subtract the midpoint of the two smoothed tracks
        for (j, dst) in out.channel_mut(ch).iter_mut().enumerate() {
            let mid = 0.5 * (psmooth[j] + nsmooth[j]);
            *dst = sbuf[j] - mid;
        }
    }

    Ok(out)
}
