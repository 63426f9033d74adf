//! Collection is a named set of flashcards, optionally nested under a parent collection
use super::CollectionId;
use serde::{Deserialize, Serialize};

/// Card content without any identity, as found in collection files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardDraft {
    pub term: String,
    pub definition: String,
}

/// Portable form of a collection used for JSON import and export.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Collection {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub flashcards: Vec<FlashcardDraft>,
}

impl Default for Collection {
    fn default() -> Self {
        Self {
            title: "My Collection".to_string(),
            description: String::new(),
            flashcards: Vec::new(),
        }
    }
}

/// Listing entry for a stored collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    pub id: CollectionId,
    pub parent_id: Option<CollectionId>,
    pub title: String,
    pub description: String,
    pub flash_card_count: usize,
    pub children_count: usize,
}
