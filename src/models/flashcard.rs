//! Flashcard is a pair <term, definition> owned by a collection. Only text is used in terms and definitions
use serde::{Deserialize, Serialize};

pub type CardId = i64;
pub type CollectionId = i64;

/// A flashcard as handed out by a card source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    pub id: CardId,
    pub term: String,
    pub definition: String,
    /// Cumulative score kept by the backend. Informational only during a session.
    #[serde(default)]
    pub score: i32,
    pub collection_id: CollectionId,
}

/// Accumulated result for one card, sent to a score sink when a session ends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreUpdate {
    #[serde(rename = "flashCardId")]
    pub flash_card_id: CardId,
    #[serde(rename = "scoreModification")]
    pub score_modification: i32,
    #[serde(rename = "TimesLearned")]
    pub times_learned: u32,
}
