// src/candidate.rs - Highest-confidence character since the last commit

/// Best non-command label observed since the last commit.
///
/// Only a commit (or an explicit reset) clears it. A suppressed frame or a
/// frame with no hand clears the decision history but leaves the candidate
/// in place, so one noisy frame cannot throw away a strong character.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BestCandidate {
    label: Option<String>,
    confidence: f64,
}

impl BestCandidate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the candidate only on a strictly higher confidence.
    pub fn observe(&mut self, label: &str, confidence: f64) -> bool {
        if confidence > self.confidence {
            self.label = Some(label.to_string());
            self.confidence = confidence;
            true
        } else {
            false
        }
    }

    pub fn take_and_reset(&mut self) -> Option<String> {
        self.confidence = 0.0;
        self.label.take()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_strictly_higher() {
        let mut best = BestCandidate::new();
        assert!(best.observe("B", 0.8));
        assert!(!best.observe("C", 0.8));
        assert!(!best.observe("D", 0.75));
        assert_eq!(best.label(), Some("B"));
        assert!(best.observe("E", 0.93));
        assert_eq!(best.label(), Some("E"));
        assert_eq!(best.confidence(), 0.93);
    }

    #[test]
    fn test_take_and_reset() {
        let mut best = BestCandidate::new();
        best.observe("A", 0.9);
        assert_eq!(best.take_and_reset(), Some("A".to_string()));
        assert_eq!(best, BestCandidate::default());
        assert_eq!(best.take_and_reset(), None);
    }
}
