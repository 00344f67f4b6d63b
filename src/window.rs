//! Sliding sample window
//!
//! Fixed-capacity, insertion-ordered buffer of the most recent samples.
//! Oldest samples are evicted first once capacity is reached.

use std::collections::VecDeque;

/// Storage reserved up front; the buffer grows on demand past this
const INITIAL_RESERVE: usize = 1024;

/// Bounded FIFO of scalar samples
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl SampleWindow {
    /// Create an empty window holding at most `capacity` samples (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity.min(INITIAL_RESERVE)),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest one if the window is full.
    /// Returns the evicted sample, if any.
    pub fn push(&mut self, sample: f64) -> Option<f64> {
        let evicted = if self.samples.len() == self.capacity {
            self.samples.pop_front()
        } else {
            None
        };
        self.samples.push_back(sample);
        evicted
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples from oldest to newest
    pub fn iter(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fills_up_to_capacity() {
        let mut window = SampleWindow::new(4);
        for i in 0..3 {
            assert_eq!(window.push(i as f64), None);
        }
        assert_eq!(window.len(), 3);
        assert!(!window.is_full());
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut window = SampleWindow::new(3);
        for i in 0..3 {
            window.push(i as f64);
        }
        assert_eq!(window.push(3.0), Some(0.0));
        assert_eq!(window.push(4.0), Some(1.0));

        let contents: Vec<f64> = window.iter().collect();
        assert_eq!(contents, vec![2.0, 3.0, 4.0]);
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut window = SampleWindow::new(0);
        assert_eq!(window.capacity(), 1);
        window.push(1.0);
        window.push(2.0);
        assert_eq!(window.iter().collect::<Vec<_>>(), vec![2.0]);
    }

    #[test]
    fn test_huge_capacity_allocates_lazily() {
        let mut window = SampleWindow::new(usize::MAX);
        assert_eq!(window.capacity(), usize::MAX);
        window.push(1.0);
        assert_eq!(window.len(), 1);
        assert!(!window.is_full());
    }
}
