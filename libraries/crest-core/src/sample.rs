//! Multichannel sample buffer
//!
//! [`Sample`] is the unit of exchange between all processing stages: a set
//! of equally long planar `f32` channels plus the sample rate they were
//! recorded at. Stages allocate a fresh buffer, fill it, and hand it to the
//! caller by move; nothing shares ownership.

use crate::error::{CrestError, Result};

/// Planar multichannel audio buffer
///
/// Invariant: every channel has the same length. All mutating operations
/// preserve this, and `debug_assert`s check it on access.
#[derive(Debug, Clone, Default)]
pub struct Sample {
    /// Planar channel data, one `Vec` per channel
    channels: Vec<Vec<f32>>,
    /// Sample rate in Hz
    sample_rate: u32,
}

impl Sample {
    /// Allocate a zero-filled buffer of `channels` channels of `length`
    /// samples each
    ///
    /// # Errors
    /// Returns [`CrestError::AllocationFailure`] when the reservation fails;
    /// in that case nothing is left allocated.
    pub fn new(channels: usize, length: usize, sample_rate: u32) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(channels)
            .map_err(|_| CrestError::AllocationFailure {
                bytes: channels * std::mem::size_of::<Vec<f32>>(),
            })?;

        for _ in 0..channels {
            let mut ch = Vec::new();
            ch.try_reserve_exact(length)
                .map_err(|_| CrestError::AllocationFailure {
                    bytes: length * std::mem::size_of::<f32>(),
                })?;
            ch.resize(length, 0.0);
            data.push(ch);
        }

        Ok(Self {
            channels: data,
            sample_rate,
        })
    }

    /// Build a sample from already existing planar channel data
    ///
    /// # Errors
    /// Returns [`CrestError::BadArguments`] when the channels differ in
    /// length.
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if let Some(first) = channels.first() {
            let len = first.len();
            if channels.iter().any(|ch| ch.len() != len) {
                return Err(CrestError::BadArguments(
                    "channels must all have the same length",
                ));
            }
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Number of channels
    pub fn channels(&self) -> usize {
        self.channels.len()
    }

    /// Number of samples per channel
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// True when there are no channels or the channels are empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Overwrite the sample rate attribute
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    /// Immutable view of one channel
    ///
    /// # Panics
    /// Panics when `index` is out of range.
    pub fn channel(&self, index: usize) -> &[f32] {
        debug_assert!(self.channels_equal_length());
        &self.channels[index]
    }

    /// Mutable view of one channel
    ///
    /// # Panics
    /// Panics when `index` is out of range.
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    /// Iterate over immutable channel slices
    pub fn iter_channels(&self) -> impl Iterator<Item = &[f32]> {
        self.channels.iter().map(Vec::as_slice)
    }

    /// Iterate over mutable channel slices
    pub fn iter_channels_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        self.channels.iter_mut().map(Vec::as_mut_slice)
    }

    /// Drop the first `count` samples of every channel
    pub fn truncate_front(&mut self, count: usize) {
        let count = count.min(self.len());
        for ch in &mut self.channels {
            ch.drain(..count);
        }
    }

    /// Shorten every channel to at most `length` samples
    pub fn truncate(&mut self, length: usize) {
        for ch in &mut self.channels {
            ch.truncate(length);
        }
    }

    /// Absolute maximum sample value across all channels
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|ch| ch.iter())
            .fold(0.0_f32, |acc, &s| acc.max(s.abs()))
    }

    /// Duration of the buffer in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / f64::from(self.sample_rate)
    }

    fn channels_equal_length(&self) -> bool {
        let len = self.len();
        self.channels.iter().all(|ch| ch.len() == len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_is_zero_filled() {
        let s = Sample::new(2, 16, 48_000).unwrap();
        assert_eq!(s.channels(), 2);
        assert_eq!(s.len(), 16);
        assert!(s.channel(0).iter().all(|&x| x == 0.0));
        assert!(s.channel(1).iter().all(|&x| x == 0.0));
    }

    #[test]
    fn from_channels_rejects_ragged_data() {
        let err = Sample::from_channels(vec![vec![0.0; 4], vec![0.0; 5]], 44_100);
        assert!(matches!(err, Err(CrestError::BadArguments(_))));
    }

    #[test]
    fn truncate_front_keeps_channels_aligned() {
        let mut s = Sample::from_channels(
            vec![vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]],
            44_100,
        )
        .unwrap();
        s.truncate_front(2);
        assert_eq!(s.channel(0), &[3.0, 4.0]);
        assert_eq!(s.channel(1), &[7.0, 8.0]);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn truncate_front_past_end_empties_buffer() {
        let mut s = Sample::new(1, 3, 44_100).unwrap();
        s.truncate_front(10);
        assert!(s.is_empty());
    }

    #[test]
    fn truncate_shortens_all_channels() {
        let mut s = Sample::new(3, 10, 44_100).unwrap();
        s.truncate(4);
        assert_eq!(s.len(), 4);
        assert_eq!(s.channels(), 3);
    }

    #[test]
    fn peak_spans_channels() {
        let s = Sample::from_channels(vec![vec![0.1, -0.5], vec![0.2, 0.3]], 44_100).unwrap();
        assert_eq!(s.peak(), 0.5);
    }

    #[test]
    fn empty_buffer_peak_is_zero() {
        let s = Sample::new(0, 0, 44_100).unwrap();
        assert_eq!(s.peak(), 0.0);
    }

    #[test]
    fn duration() {
        let s = Sample::new(1, 44_100, 44_100).unwrap();
        assert!((s.duration_secs() - 1.0).abs() < 1e-9);
    }
}
