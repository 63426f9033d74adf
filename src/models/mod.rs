pub mod collection;
pub mod flashcard;
pub mod learning_session;
pub mod session_card;
pub mod shuffle;

pub use collection::{Collection, CollectionSummary, FlashcardDraft};
pub use flashcard::{CardId, CollectionId, Flashcard, ScoreUpdate};
pub use learning_session::{LearningSession, ScoreOutcome, SessionPhase, SessionSettings};
pub use session_card::SessionCard;
