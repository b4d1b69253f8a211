//! Robust median statistic over peak lists
//!
//! The amplitude smasher needs a "typical" peak level that outlier spikes
//! cannot drag upward, so it takes the median rather than the mean of the
//! per-block dominant peaks.

use crate::regions::Peak;

/// Median gain of an unordered peak list
///
/// The source list is not mutated; a sorted copy of the gains is consulted
/// instead. An empty list yields 0, a single item yields its own gain,
/// otherwise the sorted element at `len / 2` is returned (for even counts
/// this is the upper of the two middle elements).
pub fn median_gain(items: &[Peak]) -> f32 {
    if items.is_empty() {
        return 0.0;
    }

    let mut gains: Vec<f32> = items.iter().map(|p| p.gain).collect();
    gains.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    gains[gains.len() / 2]
}
