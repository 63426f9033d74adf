//! Wrapper for flashcards that tracks learning progress within one session.
use super::{CardId, Flashcard};

/// How many recent scores decide whether a card is remembered.
const SCORE_WINDOW: usize = 2;

#[derive(Clone, Debug)]
pub struct SessionCard {
    pub flashcard: Flashcard,
    total_score_modification: i32,
    last_two_scores: Vec<i32>,
    is_remembered: bool,
    times_learned: u32,
}

impl SessionCard {
    pub fn new(flashcard: Flashcard) -> Self {
        Self {
            flashcard,
            total_score_modification: 0,
            last_two_scores: Vec::with_capacity(SCORE_WINDOW + 1),
            is_remembered: false,
            times_learned: 0,
        }
    }

    pub fn id(&self) -> CardId {
        self.flashcard.id
    }

    pub fn total_score_modification(&self) -> i32 {
        self.total_score_modification
    }

    /// Most recent scores, oldest first. Never longer than two.
    pub fn last_two_scores(&self) -> &[i32] {
        &self.last_two_scores
    }

    pub fn is_remembered(&self) -> bool {
        self.is_remembered
    }

    pub fn times_learned(&self) -> u32 {
        self.times_learned
    }

    /// Applies one scoring event. Returns true if this event retired the card.
    pub fn record_score(&mut self, delta: i32) -> bool {
        self.total_score_modification += delta;
        self.times_learned += 1;

        self.last_two_scores.push(delta);
        if self.last_two_scores.len() > SCORE_WINDOW {
            self.last_two_scores.remove(0);
        }

        let retires = self.last_two_scores.len() == SCORE_WINDOW
            && self.last_two_scores.iter().all(|&s| s > 0);
        let newly_retired = retires && !self.is_remembered;
        if retires {
            self.is_remembered = true;
        }
        newly_retired
    }

    /// Manual override from the review list. Score bookkeeping is untouched.
    pub fn toggle_remembered(&mut self) {
        self.is_remembered = !self.is_remembered;
    }
}
