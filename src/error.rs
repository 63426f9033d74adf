//! Errors surfaced by a learn session.

use crate::models::{CardId, SessionPhase};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The card batch could not be loaded. The session cannot start.
    #[error("Failed to fetch learn session: {0}")]
    FetchFailure(String),

    /// The score sink rejected the results or was unreachable. Results are kept.
    #[error("Failed to update scores: {0}")]
    SubmitFailure(String),

    #[error(transparent)]
    Precondition(#[from] PreconditionViolation),
}

/// The engine was driven out of sequence. Indicates a caller bug; state is never changed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionViolation {
    #[error("{operation} is not allowed while the session is {phase:?}")]
    InvalidPhase {
        operation: &'static str,
        phase: SessionPhase,
    },

    #[error("card {actual} is not the card being presented (expected {expected:?})")]
    NotCurrentCard {
        expected: Option<CardId>,
        actual: CardId,
    },

    #[error("score must be nonzero and within -{range}..={range}, got {delta}")]
    InvalidScore { delta: i32, range: i32 },

    #[error("card {0} is not part of this session")]
    UnknownCard(CardId),

    #[error("every card is already remembered")]
    NothingToContinue,

    #[error("input is locked while the next card is shown")]
    TransitionLocked,
}

pub type Result<T> = std::result::Result<T, SessionError>;
