pub mod backend;
pub mod config;
pub mod database;
pub mod error;
pub mod export;
pub mod models;

pub use error::{PreconditionViolation, SessionError};
pub use models::{Flashcard, LearningSession, ScoreUpdate, SessionCard, SessionPhase};
