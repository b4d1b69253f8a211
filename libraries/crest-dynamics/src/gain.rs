//! Sample-wise gain derivation and application

use crest_core::{CrestError, Result, Sample};

/// Amplitudes at or below this level count as silence when deriving gain
/// ratios
const PRECISION: f32 = 2.5e-8;

/// Rectified deviation of the signal above an RMS reference
///
/// For every sample, `max(|src| - rms, 0)` with the RMS stream shifted by
/// `offset` samples; positions not covered by the RMS stream keep `|src|`.
///
/// # Errors
/// Fails when the channel counts differ or the output cannot be allocated.
pub fn calc_deviation(src: &Sample, rms: &Sample, offset: isize) -> Result<Sample> {
    if rms.channels() != src.channels() {
        return Err(CrestError::ChannelCountMismatch {
            left: src.channels(),
            right: rms.channels(),
        });
    }

    let mut out = src.clone();

    for ch in 0..out.channels() {
        let rbuf = rms.channel(ch);
        let dbuf = out.channel_mut(ch);

        for v in dbuf.iter_mut() {
            *v = v.abs();
        }

        let head = offset.max(0) as usize;
        let tail = (rbuf.len() as isize + offset)
            .clamp(0, dbuf.len() as isize) as usize;
        for i in head..tail {
            let r = rbuf[(i as isize - offset) as usize];
            dbuf[i] = (dbuf[i] - r).max(0.0);
        }
    }

    Ok(out)
}

/// Per-sample gain ratio turning `src` amplitudes into `reference`
/// amplitudes
///
/// Silent source samples (|src| ≤ 2.5e-8) map to a ratio of 1 so the
/// downstream multiply leaves them untouched.
///
/// # Errors
/// Fails when the channel counts differ or the output cannot be allocated.
pub fn calc_gain_adjust(reference: &Sample, src: &Sample) -> Result<Sample> {
    if reference.channels() != src.channels() {
        return Err(CrestError::ChannelCountMismatch {
            left: reference.channels(),
            right: src.channels(),
        });
    }

    let count = reference.len().min(src.len());
    let mut out = Sample::new(src.channels(), count, src.sample_rate())?;

    for ch in 0..src.channels() {
        let rbuf = reference.channel(ch);
        let sbuf = src.channel(ch);
        for (i, dst) in out.channel_mut(ch).iter_mut().enumerate() {
            let aref = rbuf[i].abs();
            let asrc = sbuf[i].abs();
            *dst = if asrc <= PRECISION { 1.0 } else { aref / asrc };
        }
    }

    Ok(out)
}

/// Multiply a signal by a per-sample gain stream
///
/// Output length is the shorter of the two inputs.
///
/// # Errors
/// Fails when the channel counts differ or the output cannot be allocated.
pub fn apply_gain(src: &Sample, gain: &Sample) -> Result<Sample> {
    if src.channels() != gain.channels() {
        return Err(CrestError::ChannelCountMismatch {
            left: src.channels(),
            right: gain.channels(),
        });
    }

    let count = gain.len().min(src.len());
    let mut out = Sample::new(src.channels(), count, src.sample_rate())?;

    for ch in 0..src.channels() {
        let sbuf = src.channel(ch);
        let gbuf = gain.channel(ch);
        for (i, dst) in out.channel_mut(ch).iter_mut().enumerate() {
            *dst = sbuf[i] * gbuf[i];
        }
    }

    Ok(out)
}
