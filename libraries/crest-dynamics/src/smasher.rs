//! Amplitude smasher
//!
//! Suppresses anomalously loud individual peaks while leaving normal
//! dynamics alone. Per channel: per-block dominant extrema establish a
//! median "typical" peak level for each polarity, every true local
//! extremum becomes a gain control point (outliers get the multiplier that
//! pins them to `median × threshold`, the rest get 1), and the multiplier
//! is interpolated between control points with the zero-slope cubic blend
//! so the correction never clicks.

use crate::envelope::hermite_step;
use crate::median::median_gain;
use crate::regions::Peak;
use crest_core::{Result, Sample};
use tracing::debug;

/// Enumerate every true local extremum of `buf` in order
///
/// Three-point slope-sign test: a positive sample whose slope turns from
/// non-negative to negative is a maximum, a negative sample whose slope
/// turns from non-positive to positive is a minimum. Samples outside the
/// buffer count as zero.
fn local_extrema(buf: &[f32]) -> Vec<Peak> {
    let mut peaks = Vec::new();
    let count = buf.len();

    for j in 0..count {
        let s = buf[j];
        let s_prev = if j > 0 { buf[j - 1] } else { 0.0 };
        let s_next = if j + 1 < count { buf[j + 1] } else { 0.0 };
        let ds_prev = s - s_prev;
        let ds_next = s_next - s;

        if ds_next < 0.0 && ds_prev >= 0.0 && s > 0.0 {
            peaks.push(Peak { index: j, gain: s });
        } else if ds_next > 0.0 && ds_prev <= 0.0 && s < 0.0 {
            peaks.push(Peak { index: j, gain: s });
        }
    }

    peaks
}

/// Strongest extremum of each polarity per block of `step` samples
///
/// Extrema past the last full block boundary are not counted; a trailing
/// partial block carries no vote in the median.
fn block_dominant(extrema: &[Peak], step: usize, count: usize) -> (Vec<Peak>, Vec<Peak>) {
    let mut positive: Vec<Peak> = Vec::new();
    let mut negative: Vec<Peak> = Vec::new();
    if count == 0 {
        return (positive, negative);
    }

    let cutoff = ((count - 1) / step) * step;

    for p in extrema.iter().filter(|p| p.index < cutoff) {
        let block = p.index / step;
        let list = if p.gain > 0.0 { &mut positive } else { &mut negative };
        match list.last_mut() {
            Some(last) if last.index / step == block => {
                if p.gain.abs() > last.gain.abs() {
                    *last = *p;
                }
            }
            _ => list.push(*p),
        }
    }

    (positive, negative)
}

/// Suppress outlier peaks of every channel
///
/// `threshold` is the linear factor above the per-polarity median peak
/// level at which a peak counts as an outlier. Values ≤ 1 are a
/// caller-level "disabled" sentinel; callers skip the smasher entirely in
/// that case.
///
/// # Errors
/// Fails when the output buffer cannot be allocated.
pub fn smash_amplitude(src: &Sample, threshold: f32) -> Result<Sample> {
    let mut out = src.clone();
    let step = (src.sample_rate() / 100).max(1) as usize;

    for ch in 0..out.channels() {
        let buf = out.channel_mut(ch);
        let count = buf.len();

        let mut peaks = local_extrema(buf);
        let (positive, negative) = block_dominant(&peaks, step, count);
        let p_med = median_gain(&positive);
        let n_med = median_gain(&negative);
        debug!(
            channel = ch,
            positive_median = p_med,
            negative_median = n_med,
            peaks = peaks.len(),
            "smashing amplitude"
        );

        // Terminal control point: unity at the buffer end
        peaks.push(Peak {
            index: count,
            gain: 1.0,
        });

        // Walk the control points, blending the multiplier across each span
        let mut idx = 0_usize;
        let mut gain = 1.0_f32;

        for p in &peaks {
            let med = if p.gain > 0.0 { p_med } else { n_med };
            let target = if p.gain.abs() > threshold * med.abs() {
                med * threshold / p.gain
            } else {
                1.0
            };

            if p.index > idx {
                let span = (p.index - idx) as f32;
                for k in idx..p.index {
                    buf[k] *= hermite_step(gain, target, (k - idx) as f32 / span);
                }
            }

            idx = p.index;
            gain = target;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sine of 32-sample period with one cycle boosted
    fn spiky_signal(length: usize, base: f32, spike_at: usize, spike: f32) -> Vec<f32> {
        (0..length)
            .map(|i| {
                let amp = if i >= spike_at && i < spike_at + 32 { spike } else { base };
                amp * (2.0 * std::f32::consts::PI * i as f32 / 32.0).sin()
            })
            .collect()
    }

    #[test]
    fn extrema_of_a_sine_alternate() {
        let buf: Vec<f32> = (0..128)
            .map(|i| (2.0 * std::f32::consts::PI * i as f32 / 32.0).sin())
            .collect();
        let peaks = local_extrema(&buf);
        assert_eq!(peaks.len(), 8);
        for pair in peaks.windows(2) {
            assert!(pair[0].gain * pair[1].gain < 0.0, "{pair:?}");
        }
    }

    #[test]
    fn extrema_of_silence_is_empty() {
        let silence = vec![0.0_f32; 64];
        assert!(local_extrema(&silence).is_empty());
    }

    #[test]
    fn block_dominant_keeps_strongest_per_block() {
        let peaks = vec![
            Peak { index: 2, gain: 0.3 },
            Peak { index: 5, gain: 0.9 },
            Peak { index: 7, gain: -0.4 },
            Peak { index: 12, gain: 0.5 },
        ];
        // step 10, count 21 -> cutoff 20, blocks [0,10) and [10,20)
        let (pos, neg) = block_dominant(&peaks, 10, 21);
        assert_eq!(pos.len(), 2);
        assert_eq!(pos[0].gain, 0.9);
        assert_eq!(pos[1].gain, 0.5);
        assert_eq!(neg.len(), 1);
        assert_eq!(neg[0].gain, -0.4);
    }

    #[test]
    fn outlier_peak_is_pinned_to_median_times_threshold() {
        let data = spiky_signal(4800, 0.5, 320, 1.0);
        let src = Sample::from_channels(vec![data], 4800).unwrap();
        let out = smash_amplitude(&src, 1.5).unwrap();
        // The spike peaks at index 328 (sin == 1 there); typical peak level
        // is 0.5, so the corrected value is 0.5 * 1.5 = 0.75
        assert!(
            (out.channel(0)[328] - 0.75).abs() < 1e-3,
            "corrected peak = {}",
            out.channel(0)[328]
        );
    }

    #[test]
    fn normal_peaks_pass_through_untouched() {
        let data: Vec<f32> = (0..4800)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * i as f32 / 32.0).sin())
            .collect();
        let src = Sample::from_channels(vec![data.clone()], 4800).unwrap();
        // threshold × median = 2.5 × 0.5 = 1.25: nothing qualifies, not
        // even the unity terminal control point
        let out = smash_amplitude(&src, 2.5).unwrap();
        for (j, (&a, &b)) in data.iter().zip(out.channel(0).iter()).enumerate() {
            assert!((a - b).abs() < 1e-6, "sample {j} changed: {a} -> {b}");
        }
    }

    #[test]
    fn silence_stays_silent() {
        let src = Sample::new(2, 4800, 48_000).unwrap();
        let out = smash_amplitude(&src, 1.5).unwrap();
        assert!(out.iter_channels().all(|ch| ch.iter().all(|&s| s == 0.0)));
    }

    #[test]
    fn negative_outliers_are_suppressed_too() {
        let data: Vec<f32> = spiky_signal(4800, 0.5, 640, 1.0)
            .into_iter()
            .map(|s| -s)
            .collect();
        let src = Sample::from_channels(vec![data], 4800).unwrap();
        let out = smash_amplitude(&src, 1.5).unwrap();
        // Mirror image of the positive case: trough at 648 pinned to -0.75
        assert!(
            (out.channel(0)[648] - (-0.75)).abs() < 1e-3,
            "corrected trough = {}",
            out.channel(0)[648]
        );
    }
}
