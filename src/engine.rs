// src/engine.rs - Per-frame recognition state machine
use tracing::{debug, warn};

use crate::assembler::{Display, SentenceAssembler};
use crate::candidate::BestCandidate;
use crate::classifier::Prediction;
use crate::config::SmoothingConfig;
use crate::labels::{Command, LabelSet};
use crate::smoothing::{Admission, TemporalSmoother};
use crate::Result;

/// Result of feeding one frame through the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub display: Display,
    pub sentence: String,
    /// Top-class probability of this frame, 0.0 when no hand was seen
    pub confidence: f64,
    /// `None` when the frame never reached the smoother
    pub admission: Option<Admission>,
}

/// Decision history, best candidate, sentence and last display, mutated
/// only through [`Engine::no_hand`], [`Engine::observe`] and
/// [`Engine::reset`].
pub struct Engine {
    labels: LabelSet,
    smoother: TemporalSmoother,
    best: BestCandidate,
    assembler: SentenceAssembler,
    display: Display,
    confidence: f64,
}

impl Engine {
    pub fn new(labels: LabelSet, config: SmoothingConfig) -> Self {
        Self {
            labels,
            smoother: TemporalSmoother::new(config),
            best: BestCandidate::new(),
            assembler: SentenceAssembler::new(),
            display: Display::Placeholder,
            confidence: 0.0,
        }
    }

    /// No hand in the frame: history is cleared, the candidate survives.
    pub fn no_hand(&mut self) -> FrameOutcome {
        self.smoother.clear();
        self.publish(Display::Placeholder, 0.0, None)
    }

    pub fn observe(&mut self, probabilities: &[f64]) -> Result<FrameOutcome> {
        let prediction = Prediction::from_probabilities(probabilities)?;
        Ok(self.observe_prediction(prediction))
    }

    pub fn observe_prediction(&mut self, prediction: Prediction) -> FrameOutcome {
        let Prediction { index, confidence } = prediction;

        let Some(label) = self.labels.get(index) else {
            warn!(
                "Predicted index {} outside label set of {}, ignoring frame",
                index,
                self.labels.len()
            );
            self.smoother.clear();
            return self.publish(Display::Placeholder, confidence, None);
        };

        let admission = self.smoother.admit(index, confidence);
        if admission.is_admitted() && Command::parse(label).is_none() {
            if self.best.observe(label, confidence) {
                debug!("Best candidate now '{}' at {:.3}", label, confidence);
            }
        }

        let display = match admission.stable().and_then(|stable| self.labels.get(stable)) {
            Some(stable_label) => {
                self.assembler
                    .on_stable(stable_label, &mut self.best, &mut self.smoother)
            }
            None => Display::Placeholder,
        };

        self.publish(display, confidence, Some(admission))
    }

    /// Clears everything, including the sentence. Idempotent.
    pub fn reset(&mut self) {
        self.smoother.clear();
        self.best.take_and_reset();
        self.assembler.clear();
        self.display = Display::Placeholder;
        self.confidence = 0.0;
    }

    fn publish(
        &mut self,
        display: Display,
        confidence: f64,
        admission: Option<Admission>,
    ) -> FrameOutcome {
        self.display = display.clone();
        self.confidence = confidence;
        FrameOutcome {
            display,
            sentence: self.assembler.sentence().to_string(),
            confidence,
            admission,
        }
    }

    pub fn sentence(&self) -> &str {
        self.assembler.sentence()
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn best_candidate(&self) -> &BestCandidate {
        &self.best
    }

    pub fn history_len(&self) -> usize {
        self.smoother.buffer().len()
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }
}
