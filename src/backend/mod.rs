//! Card sources and score sinks a learn session talks to.
//!
//! Two backends exist:
//! - [`api::ApiClient`] for the remote REST service
//! - [`crate::database::db::LocalStore`] for offline use with SQLite

pub mod api;

use crate::config::BackendConfig;
use crate::database::db::LocalStore;
use crate::models::{CardId, CollectionId, Flashcard, ScoreUpdate};
use api::ApiClient;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message} (status {status})")]
    Api { status: u16, message: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Collection not found: {0}")]
    CollectionNotFound(CollectionId),

    #[error("Flashcard not found: {0}")]
    CardNotFound(CardId),

    #[error("Local store is unavailable")]
    StoreUnavailable,
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// Supplies the fixed batch of cards a session runs over.
pub trait CardSource: Send + Sync {
    fn fetch_batch(&self, collection_id: CollectionId, count: usize) -> Result<Vec<Flashcard>>;
}

/// Accepts the accumulated score changes at the end of a session.
pub trait ScoreSink: Send + Sync {
    fn submit(&self, updates: &[ScoreUpdate]) -> Result<()>;
}

/// Anything that can both start and finish a session.
pub trait LearnBackend: CardSource + ScoreSink {
    /// Short human readable description, shown by the presenter.
    fn describe(&self) -> String;
}

/// The backend a presenter works with. `store` is set when the local store is in use,
/// which additionally offers collection management.
pub struct Backends {
    pub learn: Arc<dyn LearnBackend>,
    pub store: Option<Arc<LocalStore>>,
}

/// Opens the backend described by the configuration.
pub fn connect(config: &BackendConfig) -> Result<Backends> {
    match config {
        BackendConfig::Local { database_path } => {
            let store = Arc::new(LocalStore::open(database_path)?);
            Ok(Backends {
                learn: store.clone(),
                store: Some(store),
            })
        }
        BackendConfig::Remote {
            api_url,
            api_token,
            timeout_secs,
        } => {
            let client = ApiClient::new(
                api_url,
                api_token.clone(),
                Duration::from_secs(*timeout_secs),
            )?;
            Ok(Backends {
                learn: Arc::new(client),
                store: None,
            })
        }
    }
}
