//! Zero-crossing region segmentation and peak finding
//!
//! Splits a channel into contiguous spans between zero crossings and
//! finalizes a region whenever its strongest interior peak clears an
//! adaptive threshold derived from a parallel reference RMS stream. The
//! scan is a single left-to-right state machine that only ever emits
//! finalized, immutable region records; the emitted sequence tiles the
//! scanned range with no gaps or overlaps.

use std::f32::consts::FRAC_1_SQRT_2;

/// A contiguous span between zero crossings
///
/// `first <= peak < last` (except the degenerate case of a region that
/// never saw an extremum); `gain` is the signed amplitude at `peak`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    /// First sample of the span
    pub first: usize,
    /// First sample after the span
    pub last: usize,
    /// Index of the strongest interior extremum
    pub peak: usize,
    /// Signed amplitude at `peak`
    pub gain: f32,
}

/// A single local extremum
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Sample index of the extremum
    pub index: usize,
    /// Signed amplitude at the extremum
    pub gain: f32,
}

/// Index and signed value of the absolute maximum of `buf`, relative to
/// `base`
fn abs_max_peak(buf: &[f32], base: usize) -> (usize, f32) {
    let mut best = 0;
    for (i, &v) in buf.iter().enumerate() {
        if v.abs() > buf[best].abs() {
            best = i;
        }
    }
    (base + best, buf.get(best).copied().unwrap_or(0.0))
}

/// Segment `buf` at zero crossings and isolate peak regions
///
/// `rms` is a parallel reference stream (typically a windowed RMS of the
/// same signal) used for the adaptive threshold
/// `max(rms[peak] / √2, threshold)`. Regions are finalized at the crossing
/// that follows a qualifying peak; when more than one crossing passed since
/// the previous finalized region, the intervening span is first split off
/// with its own strongest interior peak. The trailing open region closes at
/// the buffer end.
///
/// The returned regions are ordered, non-overlapping, and tile
/// `[0, buf.len())` exactly.
pub fn find_peaks(buf: &[f32], rms: &[f32], threshold: f32) -> Vec<Region> {
    debug_assert!(rms.len() >= buf.len());

    let mut out = Vec::new();
    let count = buf.len();

    // Open-region state
    let mut first = 0_usize;
    let mut peak = 0_usize;
    let mut gain = 0.0_f32;

    // Scan state
    let mut s_prev = 0.0_f32;
    let mut d_prev = 0.0_f32;
    let mut flips = 0_usize;
    let mut last_flip = 0_usize;

    for i in 0..count {
        let s = buf[i];
        let d = s - s_prev;

        // Derivative sign change: the previous sample was a local extremum
        if (d_prev < 0.0 && d >= 0.0) || (d_prev > 0.0 && d <= 0.0) {
            let candidate = buf[i - 1];
            if gain.abs() < candidate.abs() {
                gain = candidate;
                peak = i - 1;
            }
        }

        // Sample sign change: potential end of the open region
        if (s_prev < 0.0 && s >= 0.0) || (s_prev > 0.0 && s <= 0.0) {
            flips += 1;

            let thresh = (rms[peak] * FRAC_1_SQRT_2).max(threshold);
            if gain.abs() >= thresh {
                if flips > 1 {
                    // Crossings passed without a qualifying peak: split the
                    // intervening span off with its own strongest extremum
                    let (span_peak, span_gain) = abs_max_peak(&buf[first..last_flip], first);
                    out.push(Region {
                        first,
                        last: last_flip,
                        peak: span_peak,
                        gain: span_gain,
                    });
                    first = last_flip;
                }

                out.push(Region {
                    first,
                    last: i,
                    peak,
                    gain,
                });

                first = i;
                peak = i;
                gain = 0.0;
                flips = 0;
            }

            last_flip = i;
        }

        s_prev = s;
        d_prev = d;
    }

    // Close the trailing open region at the buffer end
    if first < count {
        out.push(Region {
            first,
            last: count,
            peak,
            gain,
        });
    }

    out
}

/// Hard-limit every qualifying region to unit peak
///
/// Regions whose |gain| reaches `threshold` have their whole span divided
/// by the span's absolute maximum; regions below the threshold are left
/// untouched. No interpolation is applied at region boundaries.
pub fn clamp_regions(buf: &mut [f32], regions: &[Region], threshold: f32) {
    for region in regions {
        if region.gain.abs() < threshold {
            continue;
        }

        let span = &mut buf[region.first..region.last];
        let peak = span.iter().fold(0.0_f32, |acc, &v| acc.max(v.abs()));
        if peak <= 0.0 {
            continue;
        }

        let k = 1.0 / peak;
        for v in span.iter_mut() {
            *v *= k;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_tiling(regions: &[Region], count: usize) {
        assert!(!regions.is_empty() || count == 0);
        if count == 0 {
            return;
        }
        assert_eq!(regions[0].first, 0);
        assert_eq!(regions[regions.len() - 1].last, count);
        for pair in regions.windows(2) {
            assert_eq!(pair[0].last, pair[1].first, "gap or overlap in {pair:?}");
        }
    }

    fn sine(cycles: usize, samples_per_cycle: usize, amplitude: f32) -> Vec<f32> {
        (0..cycles * samples_per_cycle)
            .map(|i| {
                amplitude
                    * (2.0 * std::f32::consts::PI * i as f32 / samples_per_cycle as f32).sin()
            })
            .collect()
    }

    #[test]
    fn regions_tile_a_sine() {
        let buf = sine(8, 64, 0.8);
        let rms = vec![0.1_f32; buf.len()];
        let regions = find_peaks(&buf, &rms, 0.05);
        assert_tiling(&regions, buf.len());
        // Each half-cycle that clears the threshold becomes its own region
        assert!(regions.len() >= 8);
    }

    #[test]
    fn silence_yields_one_spanning_region() {
        let buf = vec![0.0_f32; 256];
        let rms = vec![0.0_f32; 256];
        let regions = find_peaks(&buf, &rms, 0.5);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].first, 0);
        assert_eq!(regions[0].last, 256);
    }

    #[test]
    fn empty_input_yields_no_regions() {
        let regions = find_peaks(&[], &[], 0.0);
        assert!(regions.is_empty());
    }

    #[test]
    fn peak_index_lies_inside_its_region() {
        let buf = sine(4, 100, 1.0);
        let rms = vec![0.2_f32; buf.len()];
        let regions = find_peaks(&buf, &rms, 0.1);
        for r in &regions {
            if r.gain != 0.0 {
                assert!(r.first <= r.peak && r.peak < r.last, "{r:?}");
            }
        }
    }

    #[test]
    fn sub_threshold_spans_are_split_off_on_the_next_qualifying_peak() {
        // Quiet cycle followed by a loud cycle: the quiet span must end up
        // in its own region, the loud peak in the next one
        let mut buf = sine(1, 64, 0.05);
        buf.extend(sine(1, 64, 1.0));
        let rms = vec![0.0_f32; buf.len()];
        let regions = find_peaks(&buf, &rms, 0.5);
        assert_tiling(&regions, buf.len());
        // At least one region carries the loud peak
        assert!(regions.iter().any(|r| r.gain.abs() >= 0.9));
        // And the quiet head was not merged into it
        let loud = regions.iter().find(|r| r.gain.abs() >= 0.9).unwrap();
        assert!(loud.first >= 32, "loud region starts at {}", loud.first);
    }

    #[test]
    fn adaptive_threshold_uses_reference_rms() {
        let buf = sine(4, 64, 0.4);
        // Reference RMS so high that nothing qualifies
        let rms = vec![10.0_f32; buf.len()];
        let regions = find_peaks(&buf, &rms, 0.0);
        // Only the trailing catch-all region is emitted
        assert_eq!(regions.len(), 1);
        assert_tiling(&regions, buf.len());
    }

    #[test]
    fn clamp_scales_qualifying_region_to_unit_peak() {
        let mut buf = sine(1, 64, 2.0);
        let rms = vec![0.0_f32; buf.len()];
        let regions = find_peaks(&buf, &rms, 0.5);
        clamp_regions(&mut buf, &regions, 0.5);
        let peak = buf.iter().fold(0.0_f32, |a, &v| a.max(v.abs()));
        assert!((peak - 1.0).abs() < 1e-6);
    }

    #[test]
    fn clamp_ignores_sub_threshold_regions() {
        let mut buf = sine(1, 64, 0.1);
        let original = buf.clone();
        let rms = vec![0.0_f32; buf.len()];
        let regions = find_peaks(&buf, &rms, 0.0);
        clamp_regions(&mut buf, &regions, 0.5);
        assert_eq!(buf, original);
    }
}
