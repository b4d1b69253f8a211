//! Bounded sliding-window accumulator
//!
//! The energy estimators need the running sum of the trailing W samples at
//! every position. A ring buffer holds exactly the window contents, so the
//! value leaving the window is always read back from the ring instead of
//! being re-derived through index arithmetic on the source buffer.

/// Ring-buffered running sum over a fixed-length window
#[derive(Debug)]
pub(crate) struct SlidingWindow {
    ring: Vec<f32>,
    head: usize,
    filled: usize,
    sum: f32,
}

impl SlidingWindow {
    /// Create an accumulator over a window of `window` samples
    ///
    /// `window` must be non-zero; callers validate this at the operation
    /// boundary.
    pub(crate) fn new(window: usize) -> Self {
        debug_assert!(window > 0);
        Self {
            ring: vec![0.0; window],
            head: 0,
            filled: 0,
            sum: 0.0,
        }
    }

    /// Push one value and return the running sum of the last `window`
    /// pushed values
    #[inline]
    pub(crate) fn push(&mut self, value: f32) -> f32 {
        debug_assert!(self.filled <= self.ring.len());

        let slot = self.head;
        if self.filled == self.ring.len() {
            self.sum -= self.ring[slot];
        } else {
            self.filled += 1;
        }
        self.ring[slot] = value;
        self.sum += value;
        self.head = (slot + 1) % self.ring.len();
        self.sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_until_window_fills() {
        let mut w = SlidingWindow::new(3);
        assert_eq!(w.push(1.0), 1.0);
        assert_eq!(w.push(2.0), 3.0);
        assert_eq!(w.push(3.0), 6.0);
    }

    #[test]
    fn evicts_oldest_once_full() {
        let mut w = SlidingWindow::new(3);
        w.push(1.0);
        w.push(2.0);
        w.push(3.0);
        assert_eq!(w.push(4.0), 9.0); // 2+3+4
        assert_eq!(w.push(0.0), 7.0); // 3+4+0
    }

    #[test]
    fn window_of_one_tracks_the_input() {
        let mut w = SlidingWindow::new(1);
        assert_eq!(w.push(5.0), 5.0);
        assert_eq!(w.push(-2.0), -2.0);
    }

    #[test]
    fn constant_input_converges_to_window_sum() {
        let mut w = SlidingWindow::new(64);
        let mut last = 0.0;
        for _ in 0..1000 {
            last = w.push(0.25);
        }
        assert!((last - 16.0).abs() < 1e-4);
    }
}
