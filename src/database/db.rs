//! Local SQLite store for offline learning
//!
//! Handles database initialization, CRUD operations for collections and flashcards,
//! and serves as a card source and score sink for learn sessions.

use crate::backend::{BackendError, CardSource, LearnBackend, Result, ScoreSink};
use crate::models::{
    CardId, Collection, CollectionId, CollectionSummary, Flashcard, FlashcardDraft, ScoreUpdate,
};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub const DEFAULT_DATABASE_PATH: &str = "db.sqlite3";

pub struct LocalStore {
    conn: Mutex<Connection>,
    location: String,
}

impl LocalStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn, path.display().to_string())
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, ":memory:".to_string())
    }

    /// Creates the tables for collections and flashcards if they are missing.
    fn init(conn: Connection, location: String) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS collections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                parent_id INTEGER,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                FOREIGN KEY (parent_id) REFERENCES collections(id) ON DELETE CASCADE
            )",
            (),
        )?;

        // Score and learn counts accumulate across sessions
        conn.execute(
            "CREATE TABLE IF NOT EXISTS flashcards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                collection_id INTEGER NOT NULL,
                term TEXT NOT NULL,
                definition TEXT NOT NULL,
                score INTEGER NOT NULL DEFAULT 0,
                times_learned INTEGER NOT NULL DEFAULT 0,
                last_learned_at TEXT,
                FOREIGN KEY (collection_id) REFERENCES collections(id) ON DELETE CASCADE,
                UNIQUE(collection_id, term)
            )",
            (),
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            location,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| BackendError::StoreUnavailable)
    }

    pub fn is_empty(&self) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM collections", [], |row| row.get(0))?;
        Ok(count == 0)
    }

    /// Creates a new collection and returns its id
    pub fn create_collection(
        &self,
        title: &str,
        description: &str,
        parent_id: Option<CollectionId>,
    ) -> Result<CollectionId> {
        let conn = self.conn()?;
        if let Some(parent) = parent_id {
            ensure_collection(&conn, parent)?;
        }
        let id = insert_collection(&conn, title, description, parent_id)?;
        log::info!("Collection '{}' created with id {}", title, id);
        Ok(id)
    }

    /// Adds a flashcard to a collection and returns its id.
    ///
    /// A card with the same term already in the collection is kept as is.
    pub fn add_flashcard(
        &self,
        collection_id: CollectionId,
        term: &str,
        definition: &str,
    ) -> Result<CardId> {
        let conn = self.conn()?;
        ensure_collection(&conn, collection_id)?;
        insert_flashcard(&conn, collection_id, term, definition)
    }

    /// Lists all collections with their card and child counts
    pub fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.parent_id, c.title, c.description,
                    (SELECT COUNT(*) FROM flashcards f WHERE f.collection_id = c.id),
                    (SELECT COUNT(*) FROM collections ch WHERE ch.parent_id = c.id)
             FROM collections c
             ORDER BY c.title, c.id",
        )?;

        let collections = stmt
            .query_map([], |row| {
                Ok(CollectionSummary {
                    id: row.get(0)?,
                    parent_id: row.get(1)?,
                    title: row.get(2)?,
                    description: row.get(3)?,
                    flash_card_count: row.get::<_, i64>(4)? as usize,
                    children_count: row.get::<_, i64>(5)? as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(collections)
    }

    /// Renames a collection and replaces its description
    pub fn update_collection(
        &self,
        collection_id: CollectionId,
        title: &str,
        description: &str,
    ) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE collections SET title = ?1, description = ?2 WHERE id = ?3",
            params![title, description, collection_id],
        )?;
        if changed == 0 {
            return Err(BackendError::CollectionNotFound(collection_id));
        }
        log::info!("Collection {} updated", collection_id);
        Ok(())
    }

    /// Deletes a collection together with its sub-collections and their flashcards
    pub fn delete_collection(&self, collection_id: CollectionId) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM collections WHERE id = ?1",
            params![collection_id],
        )?;
        if changed == 0 {
            return Err(BackendError::CollectionNotFound(collection_id));
        }
        log::info!("Collection {} deleted", collection_id);
        Ok(())
    }

    /// Retrieves all flashcards of a collection in insertion order
    pub fn get_flashcards(&self, collection_id: CollectionId) -> Result<Vec<Flashcard>> {
        self.search_flashcards(collection_id, "")
    }

    /// Flashcards whose term or definition contains `search`, ignoring ASCII case.
    /// An empty search matches every card.
    pub fn search_flashcards(
        &self,
        collection_id: CollectionId,
        search: &str,
    ) -> Result<Vec<Flashcard>> {
        let conn = self.conn()?;
        ensure_collection(&conn, collection_id)?;
        let mut stmt = conn.prepare(
            "SELECT id, term, definition, score, collection_id
             FROM flashcards
             WHERE collection_id = ?1
               AND (?2 = ''
                    OR instr(lower(term), lower(?2)) > 0
                    OR instr(lower(definition), lower(?2)) > 0)
             ORDER BY id",
        )?;
        let flashcards = stmt
            .query_map(params![collection_id, search.trim()], read_flashcard)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(flashcards)
    }

    /// Changes the term and definition of a flashcard. Learning progress is kept.
    pub fn update_flashcard(&self, card_id: CardId, term: &str, definition: &str) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE flashcards SET term = ?1, definition = ?2 WHERE id = ?3",
            params![term, definition, card_id],
        )?;
        if changed == 0 {
            return Err(BackendError::CardNotFound(card_id));
        }
        Ok(())
    }

    /// Deletes the given flashcards and returns how many existed
    pub fn delete_flashcards(&self, card_ids: &[CardId]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut deleted = 0;
        for id in card_ids {
            deleted += tx.execute("DELETE FROM flashcards WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        log::info!("Deleted {} of {} flashcards", deleted, card_ids.len());
        Ok(deleted)
    }

    /// Loads a collection in its portable form, for export
    pub fn load_collection(&self, collection_id: CollectionId) -> Result<Collection> {
        let (title, description) = {
            let conn = self.conn()?;
            conn.query_row(
                "SELECT title, description FROM collections WHERE id = ?1",
                params![collection_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?
            .ok_or(BackendError::CollectionNotFound(collection_id))?
        };

        let flashcards = self
            .get_flashcards(collection_id)?
            .into_iter()
            .map(|fc| FlashcardDraft {
                term: fc.term,
                definition: fc.definition,
            })
            .collect();

        Ok(Collection {
            title,
            description,
            flashcards,
        })
    }

    /// Stores an imported collection as a new top-level collection.
    /// Nothing is stored if any card fails to insert.
    pub fn import_collection(&self, collection: &Collection) -> Result<CollectionId> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let id = insert_collection(&tx, &collection.title, &collection.description, None)?;
        for draft in &collection.flashcards {
            insert_flashcard(&tx, id, &draft.term, &draft.definition)?;
        }
        tx.commit()?;

        log::info!(
            "Collection '{}' imported with {} cards",
            collection.title,
            collection.flashcards.len()
        );
        Ok(id)
    }

    /// Creates a small sample collection so a fresh install has something to learn
    pub fn seed_sample_data(&self) -> Result<CollectionId> {
        let id = self.create_collection("Polish Vocabulary", "Everyday phrases", None)?;
        self.add_flashcard(id, "cześć", "hello")?;
        self.add_flashcard(id, "dziękuję", "thank you")?;
        self.add_flashcard(id, "proszę", "please")?;
        self.add_flashcard(id, "do widzenia", "goodbye")?;
        log::info!("Sample data created");
        Ok(id)
    }
}

fn ensure_collection(conn: &Connection, collection_id: CollectionId) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM collections WHERE id = ?1)",
        params![collection_id],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(BackendError::CollectionNotFound(collection_id))
    }
}

fn insert_collection(
    conn: &Connection,
    title: &str,
    description: &str,
    parent_id: Option<CollectionId>,
) -> Result<CollectionId> {
    conn.execute(
        "INSERT INTO collections (parent_id, title, description) VALUES (?1, ?2, ?3)",
        params![parent_id, title, description],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_flashcard(
    conn: &Connection,
    collection_id: CollectionId,
    term: &str,
    definition: &str,
) -> Result<CardId> {
    // Insert flashcard (or ignore if duplicate)
    conn.execute(
        "INSERT OR IGNORE INTO flashcards (collection_id, term, definition) VALUES (?1, ?2, ?3)",
        params![collection_id, term, definition],
    )?;

    let id = conn.query_row(
        "SELECT id FROM flashcards WHERE collection_id = ?1 AND term = ?2",
        params![collection_id, term],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn read_flashcard(row: &rusqlite::Row<'_>) -> rusqlite::Result<Flashcard> {
    Ok(Flashcard {
        id: row.get(0)?,
        term: row.get(1)?,
        definition: row.get(2)?,
        score: row.get(3)?,
        collection_id: row.get(4)?,
    })
}

impl CardSource for LocalStore {
    /// Weakest cards first: lowest score, then oldest.
    fn fetch_batch(&self, collection_id: CollectionId, count: usize) -> Result<Vec<Flashcard>> {
        let conn = self.conn()?;
        ensure_collection(&conn, collection_id)?;

        let mut stmt = conn.prepare(
            "SELECT id, term, definition, score, collection_id
             FROM flashcards
             WHERE collection_id = ?1
             ORDER BY score ASC, id ASC
             LIMIT ?2",
        )?;
        let flashcards = stmt
            .query_map(params![collection_id, count as i64], read_flashcard)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(flashcards)
    }
}

impl ScoreSink for LocalStore {
    fn submit(&self, updates: &[ScoreUpdate]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        for update in updates {
            let changed = tx.execute(
                "UPDATE flashcards
                 SET score = score + ?1, times_learned = times_learned + ?2, last_learned_at = ?3
                 WHERE id = ?4",
                params![
                    update.score_modification,
                    update.times_learned,
                    now,
                    update.flash_card_id
                ],
            )?;
            if changed == 0 {
                // Dropping the transaction rolls back earlier updates
                return Err(BackendError::CardNotFound(update.flash_card_id));
            }
        }

        tx.commit()?;
        Ok(())
    }
}

impl LearnBackend for LocalStore {
    fn describe(&self) -> String {
        format!("Local: {}", self.location)
    }
}
