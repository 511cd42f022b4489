// src/assembler.rs - Command state machine that grows the sentence
use std::fmt;

use tracing::info;

use crate::candidate::BestCandidate;
use crate::labels::Command;
use crate::smoothing::TemporalSmoother;

pub const PLACEHOLDER_GLYPH: &str = "—";
pub const COMMIT_GLYPH: &str = "✓";
pub const SPACE_GLYPH: &str = "␣";

/// What the user sees as the current character.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Display {
    #[default]
    Placeholder,
    Char(String),
    /// `NEXT` was accepted.
    Committed,
    /// `SPACE` was accepted.
    Space,
}

impl Display {
    pub fn glyph(&self) -> &str {
        match self {
            Display::Placeholder => PLACEHOLDER_GLYPH,
            Display::Char(label) => label.as_str(),
            Display::Committed => COMMIT_GLYPH,
            Display::Space => SPACE_GLYPH,
        }
    }
}

impl fmt::Display for Display {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glyph())
    }
}

/// Owns the sentence. It only ever grows; [`SentenceAssembler::clear`] is
/// reserved for an explicit reset.
#[derive(Debug, Clone, Default)]
pub struct SentenceAssembler {
    sentence: String,
}

impl SentenceAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reacts to a stabilized label.
    ///
    /// Commands append to the sentence and restart the commit cycle by
    /// clearing both the candidate and the decision history. Any other label
    /// is only displayed; history keeps evolving with later frames.
    pub fn on_stable(
        &mut self,
        label: &str,
        best: &mut BestCandidate,
        smoother: &mut TemporalSmoother,
    ) -> Display {
        match Command::parse(label) {
            Some(Command::Next) => {
                if let Some(character) = best.take_and_reset() {
                    info!("Committed '{}'", character);
                    self.sentence.push_str(&character);
                } else {
                    info!("NEXT with no candidate, nothing committed");
                }
                smoother.clear();
                Display::Committed
            }
            Some(Command::Space) => {
                info!("Committed space");
                self.sentence.push(' ');
                best.take_and_reset();
                smoother.clear();
                Display::Space
            }
            None => Display::Char(label.to_string()),
        }
    }

    pub fn sentence(&self) -> &str {
        &self.sentence
    }

    pub fn clear(&mut self) {
        self.sentence.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primed_smoother(index: usize) -> TemporalSmoother {
        let mut smoother = TemporalSmoother::default();
        for _ in 0..3 {
            smoother.admit(index, 0.9);
        }
        smoother
    }

    #[test]
    fn test_next_commits_best_candidate() {
        let mut assembler = SentenceAssembler::new();
        let mut best = BestCandidate::new();
        best.observe("B", 0.9);
        let mut smoother = primed_smoother(5);

        let display = assembler.on_stable("NEXT", &mut best, &mut smoother);

        assert_eq!(display, Display::Committed);
        assert_eq!(assembler.sentence(), "B");
        assert_eq!(best, BestCandidate::default());
        assert!(smoother.buffer().is_empty());
    }

    #[test]
    fn test_next_without_candidate_appends_nothing() {
        let mut assembler = SentenceAssembler::new();
        let mut best = BestCandidate::new();
        let mut smoother = primed_smoother(5);

        assert_eq!(assembler.on_stable("NEXT", &mut best, &mut smoother), Display::Committed);
        assert_eq!(assembler.sentence(), "");
        assert!(smoother.buffer().is_empty());
    }

    #[test]
    fn test_space_appends_and_discards_candidate() {
        let mut assembler = SentenceAssembler::new();
        let mut best = BestCandidate::new();
        best.observe("C", 0.8);
        let mut smoother = primed_smoother(6);

        assert_eq!(assembler.on_stable("SPACE", &mut best, &mut smoother), Display::Space);
        assert_eq!(assembler.sentence(), " ");
        assert_eq!(best.label(), None);
        assert!(smoother.buffer().is_empty());
    }

    #[test]
    fn test_character_only_displays() {
        let mut assembler = SentenceAssembler::new();
        let mut best = BestCandidate::new();
        best.observe("A", 0.85);
        let mut smoother = primed_smoother(0);

        let display = assembler.on_stable("A", &mut best, &mut smoother);

        assert_eq!(display, Display::Char("A".to_string()));
        assert_eq!(assembler.sentence(), "");
        assert_eq!(best.label(), Some("A"));
        assert_eq!(smoother.buffer().len(), 3);
    }

    #[test]
    fn test_glyphs() {
        assert_eq!(Display::Placeholder.glyph(), "—");
        assert_eq!(Display::Committed.glyph(), "✓");
        assert_eq!(Display::Space.glyph(), "␣");
        assert_eq!(Display::Char("Q".into()).to_string(), "Q");
    }
}
