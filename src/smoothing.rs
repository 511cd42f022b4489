// src/smoothing.rs - Confidence gating and majority-vote stabilization
use std::collections::VecDeque;

use tracing::debug;

use crate::config::SmoothingConfig;

/// Bounded FIFO of the most recent admitted label indices.
#[derive(Debug, Clone)]
pub struct DecisionBuffer {
    entries: VecDeque<usize>,
    capacity: usize,
}

impl DecisionBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends, silently dropping the oldest entry when full.
    pub fn push(&mut self, index: usize) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(index);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().copied()
    }

    /// Most frequent index; ties go to the index that appears first in
    /// buffer order.
    pub fn majority(&self) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for (pos, &candidate) in self.entries.iter().enumerate() {
            if self.entries.iter().take(pos).any(|&seen| seen == candidate) {
                continue;
            }
            let count = self.entries.iter().filter(|&&e| e == candidate).count();
            match best {
                Some((_, best_count)) if best_count >= count => {}
                _ => best = Some((candidate, count)),
            }
        }
        best.map(|(index, _)| index)
    }
}

/// What the smoother made of one classified frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Below the suppression threshold; history was cleared.
    Suppressed,
    /// Between the thresholds; history untouched, no decision.
    Deferred,
    /// Admitted into history, not enough entries to decide yet.
    Accumulating,
    /// Admitted, and the history now agrees on this label index.
    Stable(usize),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Accumulating | Admission::Stable(_))
    }

    pub fn stable(&self) -> Option<usize> {
        match self {
            Admission::Stable(index) => Some(*index),
            _ => None,
        }
    }
}

pub struct TemporalSmoother {
    buffer: DecisionBuffer,
    config: SmoothingConfig,
}

impl TemporalSmoother {
    pub fn new(config: SmoothingConfig) -> Self {
        Self {
            buffer: DecisionBuffer::new(config.history_capacity),
            config,
        }
    }

    pub fn admit(&mut self, index: usize, confidence: f64) -> Admission {
        if confidence < self.config.suppression_threshold {
            debug!("Suppressed label {} at {:.3}, clearing history", index, confidence);
            self.buffer.clear();
            return Admission::Suppressed;
        }

        if confidence <= self.config.admission_threshold {
            debug!("Deferred label {} at {:.3}", index, confidence);
            return Admission::Deferred;
        }

        self.buffer.push(index);

        if self.buffer.len() < self.config.min_stable_frames {
            return Admission::Accumulating;
        }

        match self.buffer.majority() {
            Some(stable) => Admission::Stable(stable),
            None => Admission::Accumulating,
        }
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn buffer(&self) -> &DecisionBuffer {
        &self.buffer
    }

    pub fn config(&self) -> &SmoothingConfig {
        &self.config
    }
}

impl Default for TemporalSmoother {
    fn default() -> Self {
        Self::new(SmoothingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_evicts_oldest() {
        let mut buffer = DecisionBuffer::new(5);
        for i in 0..8 {
            buffer.push(i);
            assert!(buffer.len() <= 5);
        }
        assert_eq!(buffer.iter().collect::<Vec<_>>(), vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_majority_counts() {
        let mut buffer = DecisionBuffer::new(5);
        for i in [2, 4, 4, 2, 4] {
            buffer.push(i);
        }
        assert_eq!(buffer.majority(), Some(4));
    }

    #[test]
    fn test_majority_tie_prefers_first_seen() {
        let mut buffer = DecisionBuffer::new(5);
        for i in [6, 1, 1, 6] {
            buffer.push(i);
        }
        assert_eq!(buffer.majority(), Some(6));

        let mut buffer = DecisionBuffer::new(5);
        for i in [3, 0, 5] {
            buffer.push(i);
        }
        assert_eq!(buffer.majority(), Some(3));
    }

    #[test]
    fn test_majority_empty() {
        assert_eq!(DecisionBuffer::new(5).majority(), None);
    }

    #[test]
    fn test_no_decision_below_three_entries() {
        let mut smoother = TemporalSmoother::default();
        assert_eq!(smoother.admit(1, 0.9), Admission::Accumulating);
        assert_eq!(smoother.admit(1, 0.9), Admission::Accumulating);
        assert_eq!(smoother.admit(1, 0.9), Admission::Stable(1));
    }

    #[test]
    fn test_suppression_clears_history() {
        let mut smoother = TemporalSmoother::default();
        smoother.admit(2, 0.9);
        smoother.admit(2, 0.9);
        assert_eq!(smoother.admit(2, 0.3), Admission::Suppressed);
        assert!(smoother.buffer().is_empty());
    }

    #[test]
    fn test_dead_zone_leaves_history_alone() {
        let mut smoother = TemporalSmoother::default();
        for _ in 0..3 {
            smoother.admit(0, 0.95);
        }
        for confidence in [0.5, 0.6, 0.7] {
            assert_eq!(smoother.admit(4, confidence), Admission::Deferred);
            assert_eq!(smoother.buffer().len(), 3);
        }
        assert_eq!(smoother.buffer().iter().collect::<Vec<_>>(), vec![0, 0, 0]);
    }

    #[test]
    fn test_threshold_boundaries() {
        let mut smoother = TemporalSmoother::default();
        assert_eq!(smoother.admit(0, 0.4999), Admission::Suppressed);
        assert_eq!(smoother.admit(0, 0.5), Admission::Deferred);
        assert_eq!(smoother.admit(0, 0.7), Admission::Deferred);
        assert_eq!(smoother.admit(0, 0.7001), Admission::Accumulating);
    }

    #[test]
    fn test_stable_label_follows_window() {
        let mut smoother = TemporalSmoother::default();
        for _ in 0..3 {
            smoother.admit(1, 0.9);
        }
        assert_eq!(smoother.admit(2, 0.9), Admission::Stable(1));
        assert_eq!(smoother.admit(2, 0.9), Admission::Stable(1));
        // window becomes [1, 1, 2, 2, 2]
        assert_eq!(smoother.admit(2, 0.9), Admission::Stable(2));
    }
}
