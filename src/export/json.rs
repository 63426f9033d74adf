//! JSON import/export module.
//! Saves and loads collections, and writes the outcome of a learn session to a report file.

use crate::models::{CardId, Collection, CollectionId, LearningSession};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;

/// Exports a collection to a JSON file at the specified path.
pub fn export_collection_to_path(collection: &Collection, path: &Path) -> Result<()> {
    let json_string = serde_json::to_string_pretty(collection)?;
    fs::write(path, json_string)?;
    log::info!(
        "Collection '{}' exported to '{}'",
        collection.title,
        path.display()
    );
    Ok(())
}

/// Imports a collection from a JSON file.
/// Returns an error if the file doesn't exist or contains invalid JSON.
pub fn import_collection(path: &Path) -> Result<Collection> {
    let contents = fs::read_to_string(path)?;
    let collection: Collection = serde_json::from_str(&contents)?;
    log::info!(
        "Collection '{}' read from '{}'",
        collection.title,
        path.display()
    );
    Ok(collection)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub id: CardId,
    pub term: String,
    pub definition: String,
    pub total_score_modification: i32,
    pub times_learned: u32,
    pub is_remembered: bool,
}

/// The review list of a session, as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub collection_id: CollectionId,
    pub exported_at: DateTime<Utc>,
    pub rounds: usize,
    pub cards: Vec<ReportEntry>,
}

impl SessionReport {
    pub fn from_session<R: Rng>(session: &LearningSession<R>) -> Self {
        let cards = session
            .cards()
            .iter()
            .map(|card| ReportEntry {
                id: card.id(),
                term: card.flashcard.term.clone(),
                definition: card.flashcard.definition.clone(),
                total_score_modification: card.total_score_modification(),
                times_learned: card.times_learned(),
                is_remembered: card.is_remembered(),
            })
            .collect();

        Self {
            collection_id: session.collection_id(),
            exported_at: Utc::now(),
            rounds: session.round_number(),
            cards,
        }
    }
}

pub fn export_session_report(report: &SessionReport, path: &Path) -> Result<()> {
    let json_string = serde_json::to_string_pretty(report)?;
    fs::write(path, json_string)?;
    log::info!(
        "Session report with {} cards written to '{}'",
        report.cards.len(),
        path.display()
    );
    Ok(())
}
