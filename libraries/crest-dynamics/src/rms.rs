//! Sliding energy estimators
//!
//! Each estimator filters the input through the selected weighting curve,
//! appends one window of zero padding so the filter tail drains into the
//! estimate, and runs an O(1)-per-sample window accumulator over the
//! result. Output buffers are therefore always `input length + window`
//! samples long.

use crate::window::SlidingWindow;
use crest_core::{CrestError, Result, Sample};
use crest_dsp::{Weighting, WeightingFilter};
use std::f32::consts::SQRT_2;

/// Streams emitted per input channel by the balance estimator
const BALANCE_STREAMS: usize = 5;

/// Which half of the waveform a partial estimate covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Keep `max(x, 0)`
    Positive,
    /// Keep `max(-x, 0)`
    Negative,
}

/// Five parallel per-channel streams produced by
/// [`estimate_rms_balance`]: one-sided RMS values, their geometric mean,
/// and the two rebalancing gain ratios
pub struct RmsBalance {
    data: Sample,
}

impl RmsBalance {
    /// Number of source channels the estimate was computed for
    pub fn channels(&self) -> usize {
        self.data.channels() / BALANCE_STREAMS
    }

    /// Number of samples per stream
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the estimate holds no samples
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// RMS of the positive half-wave
    pub fn positive_rms(&self, channel: usize) -> &[f32] {
        self.data.channel(channel * BALANCE_STREAMS)
    }

    /// RMS of the negative half-wave
    pub fn negative_rms(&self, channel: usize) -> &[f32] {
        self.data.channel(channel * BALANCE_STREAMS + 1)
    }

    /// Geometric mean of the two one-sided RMS streams
    pub fn reference(&self, channel: usize) -> &[f32] {
        self.data.channel(channel * BALANCE_STREAMS + 2)
    }

    /// Gain ratio `reference / positive RMS`
    pub fn positive_gain(&self, channel: usize) -> &[f32] {
        self.data.channel(channel * BALANCE_STREAMS + 3)
    }

    /// Gain ratio `reference / negative RMS`
    pub fn negative_gain(&self, channel: usize) -> &[f32] {
        self.data.channel(channel * BALANCE_STREAMS + 4)
    }
}

fn check_period(period: usize) -> Result<()> {
    if period == 0 {
        return Err(CrestError::BadArguments("estimation window must be non-zero"));
    }
    Ok(())
}

/// Filter one channel and drain the settling tail into `pad` extra samples
fn weighted_channel(src: &[f32], filter: &mut WeightingFilter, pad: usize) -> Vec<f32> {
    filter.reset();
    let mut buf = vec![0.0_f32; src.len() + pad];
    let (head, tail) = buf.split_at_mut(src.len());
    filter.process(head, src);
    for slot in tail.iter_mut() {
        *slot = filter.tick(0.0);
    }
    buf
}

/// Estimate the windowed RMS of each channel
///
/// The output is `period` samples longer than the input; the accumulator is
/// clamped to zero before the square root so rounding never produces NaN.
///
/// # Errors
/// Fails on a zero window or when the output buffer cannot be allocated.
pub fn estimate_rms(src: &Sample, weighting: Weighting, period: usize) -> Result<Sample> {
    check_period(period)?;

    let dlength = src.len() + period;
    let mut out = Sample::new(src.channels(), dlength, src.sample_rate())?;
    let scale = 1.0 / period as f32;
    let mut filter = WeightingFilter::new(weighting, src.sample_rate());

    for ch in 0..src.channels() {
        let weighted = weighted_channel(src.channel(ch), &mut filter, period);
        let mut win = SlidingWindow::new(period);
        for (dst, &s) in out.channel_mut(ch).iter_mut().zip(weighted.iter()) {
            let sum = win.push(s * s);
            *dst = (sum.max(0.0) * scale).sqrt();
        }
    }

    Ok(out)
}

/// Estimate the windowed mean of each channel
///
/// The averaging variant of [`estimate_rms`]: plain values instead of
/// squares, no square root.
///
/// # Errors
/// Fails on a zero window or when the output buffer cannot be allocated.
pub fn estimate_average(src: &Sample, weighting: Weighting, period: usize) -> Result<Sample> {
    check_period(period)?;

    let dlength = src.len() + period;
    let mut out = Sample::new(src.channels(), dlength, src.sample_rate())?;
    let scale = 1.0 / period as f32;
    let mut filter = WeightingFilter::new(weighting, src.sample_rate());

    for ch in 0..src.channels() {
        let weighted = weighted_channel(src.channel(ch), &mut filter, period);
        let mut win = SlidingWindow::new(period);
        for (dst, &s) in out.channel_mut(ch).iter_mut().zip(weighted.iter()) {
            *dst = win.push(s) * scale;
        }
    }

    Ok(out)
}

/// Estimate the one-sided windowed RMS of each channel
///
/// The signal is rectified to the requested polarity before accumulation,
/// yielding the RMS of one half-wave only.
///
/// # Errors
/// Fails on a zero window or when the output buffer cannot be allocated.
pub fn estimate_partial_rms(
    src: &Sample,
    weighting: Weighting,
    period: usize,
    polarity: Polarity,
) -> Result<Sample> {
    check_period(period)?;

    let dlength = src.len() + period;
    let mut out = Sample::new(src.channels(), dlength, src.sample_rate())?;
    let scale = 1.0 / period as f32;
    let mut filter = WeightingFilter::new(weighting, src.sample_rate());

    for ch in 0..src.channels() {
        let weighted = weighted_channel(src.channel(ch), &mut filter, period);
        let mut win = SlidingWindow::new(period);
        for (dst, &s) in out.channel_mut(ch).iter_mut().zip(weighted.iter()) {
            let r = match polarity {
                Polarity::Positive => s.max(0.0),
                Polarity::Negative => (-s).max(0.0),
            };
            let sum = win.push(r * r);
            *dst = (sum.max(0.0) * scale).sqrt();
        }
    }

    Ok(out)
}

/// Estimate positive and negative one-sided RMS simultaneously, plus the
/// derived rebalancing streams
///
/// When either half-wave is effectively silent the gain ratios are emitted
/// as 1.0: a one-sided signal carries no balance information to correct.
///
/// # Errors
/// Fails on a zero window or when the output buffers cannot be allocated.
pub fn estimate_rms_balance(
    src: &Sample,
    weighting: Weighting,
    period: usize,
) -> Result<RmsBalance> {
    check_period(period)?;

    let dlength = src.len() + period;
    let scale = 1.0 / period as f32;
    let mut filter = WeightingFilter::new(weighting, src.sample_rate());
    let mut streams: Vec<Vec<f32>> = Vec::with_capacity(src.channels() * BALANCE_STREAMS);

    for ch in 0..src.channels() {
        let weighted = weighted_channel(src.channel(ch), &mut filter, period);
        let mut pwin = SlidingWindow::new(period);
        let mut nwin = SlidingWindow::new(period);

        let mut prms_s = vec![0.0_f32; dlength];
        let mut nrms_s = vec![0.0_f32; dlength];
        let mut ref_s = vec![0.0_f32; dlength];
        let mut pgain_s = vec![0.0_f32; dlength];
        let mut ngain_s = vec![0.0_f32; dlength];

        for j in 0..dlength {
            let s = weighted[j];
            let (p, n) = if s < 0.0 { (0.0, s) } else { (s, 0.0) };
            let prms = (pwin.push(p * p).max(0.0) * scale).sqrt();
            let nrms = (nwin.push(n * n).max(0.0) * scale).sqrt();
            let reference = (prms * nrms).sqrt();
            let (pgain, ngain) = if prms <= f32::EPSILON || nrms <= f32::EPSILON {
                (1.0, 1.0)
            } else {
                (reference / prms, reference / nrms)
            };

            prms_s[j] = prms;
            nrms_s[j] = nrms;
            ref_s[j] = reference;
            pgain_s[j] = pgain;
            ngain_s[j] = ngain;
        }

        streams.push(prms_s);
        streams.push(nrms_s);
        streams.push(ref_s);
        streams.push(pgain_s);
        streams.push(ngain_s);
    }

    Ok(RmsBalance {
        data: Sample::from_channels(streams, src.sample_rate())?,
    })
}

/// Rebalance a DC-asymmetric waveform using a previously computed balance
/// estimate
///
/// Each sample is scaled by its polarity's gain ratio times √2, pulling the
/// two half-wave RMS levels toward their geometric mean.
///
/// # Errors
/// Fails when the channel counts differ or the output cannot be allocated.
pub fn apply_rms_balance(src: &Sample, balance: &RmsBalance) -> Result<Sample> {
    if balance.channels() != src.channels() {
        return Err(CrestError::ChannelCountMismatch {
            left: src.channels(),
            right: balance.channels(),
        });
    }

    let count = src.len().min(balance.len());
    let mut out = Sample::new(src.channels(), count, src.sample_rate())?;

    for ch in 0..src.channels() {
        let sbuf = src.channel(ch);
        let pgain = balance.positive_gain(ch);
        let ngain = balance.negative_gain(ch);
        for (j, dst) in out.channel_mut(ch).iter_mut().enumerate() {
            let s = sbuf[j];
            let g = if s < 0.0 { ngain[j] } else { pgain[j] };
            *dst = s * g * SQRT_2;
        }
    }

    Ok(out)
}

/// Apply a weighting filter alone, preserving the input length
///
/// # Errors
/// Fails when the output buffer cannot be allocated.
pub fn apply_weight(src: &Sample, weighting: Weighting) -> Result<Sample> {
    let mut out = src.clone();
    let mut filter = WeightingFilter::new(weighting, src.sample_rate());
    for buf in out.iter_channels_mut() {
        filter.reset();
        filter.process_inplace(buf);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_sample(value: f32, channels: usize, length: usize) -> Sample {
        Sample::from_channels(vec![vec![value; length]; channels], 48_000).unwrap()
    }

    #[test]
    fn rms_output_length_is_input_plus_window() {
        let src = constant_sample(0.5, 2, 1000);
        let rms = estimate_rms(&src, Weighting::None, 128).unwrap();
        assert_eq!(rms.len(), 1128);
        assert_eq!(rms.channels(), 2);
    }

    #[test]
    fn rms_converges_to_constant_amplitude() {
        let src = constant_sample(0.25, 1, 2000);
        let rms = estimate_rms(&src, Weighting::None, 100).unwrap();
        // Once the window fills and before the padding drains out
        for j in 100..2000 {
            assert!(
                (rms.channel(0)[j] - 0.25).abs() < 1e-5,
                "rms[{j}] = {}",
                rms.channel(0)[j]
            );
        }
    }

    #[test]
    fn rms_rejects_zero_window() {
        let src = constant_sample(0.5, 1, 100);
        assert!(matches!(
            estimate_rms(&src, Weighting::None, 0),
            Err(CrestError::BadArguments(_))
        ));
    }

    #[test]
    fn average_of_symmetric_square_wave_is_zero() {
        let data: Vec<f32> = (0..1000).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let src = Sample::from_channels(vec![data], 48_000).unwrap();
        let avg = estimate_average(&src, Weighting::None, 10).unwrap();
        for j in 10..1000 {
            assert!(avg.channel(0)[j].abs() < 1e-5);
        }
    }

    #[test]
    fn partial_rms_sees_only_one_polarity() {
        let src = constant_sample(0.5, 1, 500);
        let pos = estimate_partial_rms(&src, Weighting::None, 50, Polarity::Positive).unwrap();
        let neg = estimate_partial_rms(&src, Weighting::None, 50, Polarity::Negative).unwrap();
        assert!((pos.channel(0)[200] - 0.5).abs() < 1e-5);
        assert_eq!(neg.channel(0)[200], 0.0);
    }

    #[test]
    fn balance_of_nonnegative_signal_pins_gains_to_unity() {
        let src = constant_sample(0.5, 1, 500);
        let balance = estimate_rms_balance(&src, Weighting::None, 50).unwrap();
        for j in 0..balance.len() {
            assert_eq!(balance.negative_rms(0)[j], 0.0);
            assert_eq!(balance.positive_gain(0)[j], 1.0);
            assert_eq!(balance.negative_gain(0)[j], 1.0);
        }
    }

    #[test]
    fn balance_of_symmetric_signal_is_neutral() {
        let data: Vec<f32> = (0..2000)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * i as f32 / 50.0).sin())
            .collect();
        let src = Sample::from_channels(vec![data], 48_000).unwrap();
        let balance = estimate_rms_balance(&src, Weighting::None, 101).unwrap();
        // After the window fills, both half-waves carry the same energy
        for j in 200..2000 {
            assert!(
                (balance.positive_gain(0)[j] - 1.0).abs() < 0.05,
                "pgain[{j}] = {}",
                balance.positive_gain(0)[j]
            );
        }
    }

    #[test]
    fn apply_balance_checks_channel_count() {
        let src = constant_sample(0.5, 2, 100);
        let mono = constant_sample(0.5, 1, 100);
        let balance = estimate_rms_balance(&mono, Weighting::None, 10).unwrap();
        assert!(matches!(
            apply_rms_balance(&src, &balance),
            Err(CrestError::ChannelCountMismatch { left: 2, right: 1 })
        ));
    }

    #[test]
    fn apply_weight_none_is_identity() {
        let src = constant_sample(0.3, 2, 64);
        let out = apply_weight(&src, Weighting::None).unwrap();
        assert_eq!(out.channel(0), src.channel(0));
        assert_eq!(out.len(), src.len());
    }
}
