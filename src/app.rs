//! Main application UI and state management.
//! Handles collection management, the learn session screens, and background backend calls.

use eframe::egui;
use flashcards_app::backend::{self, LearnBackend};
use flashcards_app::database::db::LocalStore;
use flashcards_app::export::json::{
    SessionReport, export_collection_to_path, export_session_report, import_collection,
};
use flashcards_app::models::{
    CardId, CollectionId, CollectionSummary, Flashcard, LearningSession, SessionPhase,
    SessionSettings,
};
use flashcards_app::SessionError;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

/// Application screen states
#[derive(Default, PartialEq, Eq)]
enum AppScreen {
    #[default]
    Main,
    LearningSession,
}

/// Result of a backend call made off the UI thread
enum BackendReply {
    Loaded(backend::Result<Vec<Flashcard>>),
    Submitted(backend::Result<()>),
}

/// User input on the learn screen, applied after rendering
enum SessionAction {
    Flip,
    Score(i32),
    ToggleRemembered(CardId),
    Continue,
    End,
    RetryLoad,
    RetrySubmit,
    ExportReport,
    AskExit,
    Back,
}

/// Destructive store operation waiting for confirmation
enum PendingDelete {
    Collection { id: CollectionId, title: String },
    Flashcards(Vec<CardId>),
}

/// Input on the flashcard list, applied after rendering
enum CardAction {
    ToggleChecked(CardId),
    StartEdit(CardId),
    SaveEdit(CardId),
    CancelEdit,
}

/// Main application state
pub struct LearnerApp {
    backend: Arc<dyn LearnBackend>,
    store: Option<Arc<LocalStore>>,
    settings: SessionSettings,

    collections: Vec<CollectionSummary>,
    selected_collection: Option<CollectionId>,
    selected_cards: Vec<Flashcard>,
    checked_cards: HashSet<CardId>,
    search_text: String,
    collection_id_input: String,
    new_collection_title: String,
    new_collection_description: String,
    new_collection_parent: Option<CollectionId>,
    current_term: String,
    current_definition: String,

    editing_collection: Option<CollectionId>,
    edit_title: String,
    edit_description: String,
    editing_card: Option<CardId>,
    edit_term: String,
    edit_definition: String,
    pending_delete: Option<PendingDelete>,

    current_screen: AppScreen,
    learning_session: Option<LearningSession>,
    pending: Option<Receiver<BackendReply>>,

    show_confirmation_dialog: bool,
    allowed_to_close: bool,
    show_exit_dialog: bool,
    show_export_dialog: bool,
    show_message_dialog: bool,
    message: String,
}

impl eframe::App for LearnerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_backend();

        match self.current_screen {
            AppScreen::Main => self.render_main_screen(ctx),
            AppScreen::LearningSession => self.render_learning_screen(ctx),
        }

        // Handle window close requests with confirmation dialog
        if ctx.input(|i| i.viewport().close_requested()) && !self.allowed_to_close {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            self.show_confirmation_dialog = true;
        }

        if self.show_confirmation_dialog {
            egui::Window::new("Do you want to quit?")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    if self.learning_session.is_some() {
                        ui.label("The current session will not be saved.");
                    }
                    ui.horizontal(|ui| {
                        if ui.button("No").clicked() {
                            self.show_confirmation_dialog = false;
                            self.allowed_to_close = false;
                        }

                        if ui.button("Yes").clicked() {
                            self.show_confirmation_dialog = false;
                            self.allowed_to_close = true;
                            ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
                        }
                    });
                });
        }

        if self.show_exit_dialog {
            egui::Window::new("Exit Session?")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.label("Are you sure you want to exit? Your progress will not be saved.");
                    ui.add_space(10.0);
                    ui.horizontal(|ui| {
                        if ui.button("Cancel").clicked() {
                            self.show_exit_dialog = false;
                        }
                        if ui.button("Exit").clicked() {
                            self.show_exit_dialog = false;
                            self.leave_session();
                        }
                    });
                });
        }

        // exporting a collection
        if self.show_export_dialog {
            let mut export_id: Option<CollectionId> = None;
            let mut should_cancel = false;

            egui::Window::new("Export Collection")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.label("Select a collection to export:");
                    ui.separator();

                    for collection in &self.collections {
                        if ui
                            .button(format!(
                                "{} ({} cards)",
                                collection.title, collection.flash_card_count
                            ))
                            .clicked()
                        {
                            export_id = Some(collection.id);
                        }
                    }

                    ui.separator();

                    if ui.button("Cancel").clicked() {
                        should_cancel = true;
                    }
                });

            if let Some(id) = export_id {
                self.handle_export(id);
            }
            if should_cancel {
                self.show_export_dialog = false;
            }
        }

        if let Some(collection_id) = self.editing_collection {
            let mut save = false;
            let mut cancel = false;
            egui::Window::new("Edit Collection")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.horizontal(|ui| {
                        ui.label("Title:");
                        ui.text_edit_singleline(&mut self.edit_title);
                    });
                    ui.horizontal(|ui| {
                        ui.label("Description:");
                        ui.text_edit_singleline(&mut self.edit_description);
                    });
                    ui.horizontal(|ui| {
                        save = ui.button("Save").clicked();
                        cancel = ui.button("Cancel").clicked();
                    });
                });
            if save {
                self.handle_update_collection(collection_id);
            } else if cancel {
                self.editing_collection = None;
            }
        }

        if let Some(pending) = &self.pending_delete {
            let prompt = match pending {
                PendingDelete::Collection { title, .. } => format!(
                    "Delete collection '{}' with all its sub-collections and flashcards?",
                    title
                ),
                PendingDelete::Flashcards(ids) => {
                    format!("Delete {} flashcard(s)? This cannot be undone.", ids.len())
                }
            };
            let mut confirmed = false;
            let mut cancelled = false;
            egui::Window::new("Confirm Delete")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.label(prompt);
                    ui.add_space(10.0);
                    ui.horizontal(|ui| {
                        cancelled = ui.button("Cancel").clicked();
                        confirmed = ui.button("Delete").clicked();
                    });
                });
            if confirmed {
                if let Some(pending) = self.pending_delete.take() {
                    self.handle_delete(pending);
                }
            } else if cancelled {
                self.pending_delete = None;
            }
        }

        if self.show_message_dialog {
            egui::Window::new("Flashcards")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.label(&self.message);
                    ui.add_space(10.0);
                    if ui.button("OK").clicked() {
                        self.show_message_dialog = false;
                    }
                });
        }
    }
}

impl LearnerApp {
    /// Creates a new application instance on top of a backend
    pub fn new(backends: backend::Backends, settings: SessionSettings) -> Self {
        let mut app = Self {
            backend: backends.learn,
            store: backends.store,
            settings,
            collections: Vec::new(),
            selected_collection: None,
            selected_cards: Vec::new(),
            checked_cards: HashSet::new(),
            search_text: String::new(),
            collection_id_input: String::new(),
            new_collection_title: String::new(),
            new_collection_description: String::new(),
            new_collection_parent: None,
            current_term: String::new(),
            current_definition: String::new(),
            editing_collection: None,
            edit_title: String::new(),
            edit_description: String::new(),
            editing_card: None,
            edit_term: String::new(),
            edit_definition: String::new(),
            pending_delete: None,
            current_screen: AppScreen::Main,
            learning_session: None,
            pending: None,
            show_confirmation_dialog: false,
            allowed_to_close: false,
            show_exit_dialog: false,
            show_export_dialog: false,
            show_message_dialog: false,
            message: String::new(),
        };
        app.refresh_collections();
        if let Some(first) = app.collections.first().map(|c| c.id) {
            app.select_collection(first);
        }
        app
    }

    fn show_message(&mut self, message: String) {
        self.message = message;
        self.show_message_dialog = true;
    }

    fn refresh_collections(&mut self) {
        let Some(store) = &self.store else { return };
        match store.list_collections() {
            Ok(collections) => self.collections = collections,
            Err(e) => {
                log::error!("Listing collections failed: {}", e);
                self.show_message(format!("Could not list collections: {}", e));
            }
        }
    }

    fn select_collection(&mut self, collection_id: CollectionId) {
        if self.selected_collection != Some(collection_id) {
            self.checked_cards.clear();
            self.editing_card = None;
        }
        self.selected_collection = Some(collection_id);
        self.reload_cards();
    }

    fn selected_summary(&self) -> Option<&CollectionSummary> {
        let id = self.selected_collection?;
        self.collections.iter().find(|c| c.id == id)
    }

    /// Re-reads the selected collection's cards, filtered by the search text
    fn reload_cards(&mut self) {
        let (Some(store), Some(collection_id)) = (&self.store, self.selected_collection) else {
            return;
        };
        match store.search_flashcards(collection_id, &self.search_text) {
            Ok(cards) => {
                self.checked_cards.retain(|id| cards.iter().any(|c| c.id == *id));
                self.selected_cards = cards;
            }
            Err(e) => {
                log::error!("Loading flashcards of collection {} failed: {}", collection_id, e);
                self.selected_cards.clear();
                self.checked_cards.clear();
            }
        }
    }

    /// Runs a backend call on a worker thread. The reply is picked up by `poll_backend`.
    fn spawn_call<F>(&mut self, ctx: &egui::Context, job: F)
    where
        F: FnOnce(&dyn LearnBackend) -> BackendReply + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let backend = Arc::clone(&self.backend);
        let ctx = ctx.clone();
        thread::spawn(move || {
            let reply = job(backend.as_ref());
            // The receiver is gone if the session was left meanwhile
            let _ = tx.send(reply);
            ctx.request_repaint();
        });
        self.pending = Some(rx);
    }

    fn poll_backend(&mut self) {
        let Some(rx) = &self.pending else { return };
        let reply = match rx.try_recv() {
            Ok(reply) => reply,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => {
                log::error!("Backend worker stopped without a reply");
                self.pending = None;
                return;
            }
        };
        self.pending = None;

        let Some(session) = &mut self.learning_session else {
            log::warn!("Dropping backend reply, no session is open");
            return;
        };
        match reply {
            BackendReply::Loaded(result) => {
                // Failures are kept in the session and shown on the error panel
                let _ = session.finish_load(result);
            }
            BackendReply::Submitted(result) => {
                let _ = session.finish_submit(result);
                if session.phase() == SessionPhase::Closed {
                    self.finish_session("Scores saved.".to_string());
                }
            }
        }
    }

    fn finish_session(&mut self, message: String) {
        self.learning_session = None;
        self.current_screen = AppScreen::Main;
        self.refresh_collections();
        self.reload_cards();
        self.show_message(message);
    }

    /// Drops the session without submitting anything
    fn leave_session(&mut self) {
        if let Some(session) = &mut self.learning_session {
            session.exit();
        }
        self.learning_session = None;
        self.pending = None;
        self.current_screen = AppScreen::Main;
    }

    /// Renders the main screen with collection management interface
    fn render_main_screen(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.label(self.backend.describe());
            ui.separator();

            if self.store.is_none() {
                self.render_remote_picker(ui, ctx);
                return;
            }

            // Import/Export buttons
            ui.horizontal(|ui| {
                if ui.button("Export Collection").clicked() {
                    self.show_export_dialog = true;
                }
                if ui.button("Import Collection").clicked() {
                    self.handle_import();
                }
            });

            ui.separator();

            ui.heading("Create New Collection");
            ui.horizontal(|ui| {
                ui.label("Title:");
                ui.text_edit_singleline(&mut self.new_collection_title);
            });
            ui.horizontal(|ui| {
                ui.label("Description:");
                ui.text_edit_singleline(&mut self.new_collection_description);
            });
            let parent_text = self
                .new_collection_parent
                .and_then(|id| self.collections.iter().find(|c| c.id == id))
                .map_or_else(|| "(top level)".to_string(), |c| c.title.clone());
            egui::ComboBox::from_label("Parent")
                .selected_text(parent_text)
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut self.new_collection_parent, None, "(top level)");
                    for collection in &self.collections {
                        ui.selectable_value(
                            &mut self.new_collection_parent,
                            Some(collection.id),
                            collection.title.as_str(),
                        );
                    }
                });
            if ui.button("Create Collection").clicked() && !self.new_collection_title.trim().is_empty() {
                self.handle_create_collection();
            }

            ui.separator();

            ui.heading(format!("Collections ({})", self.collections.len()));

            // We store actions to execute after UI rendering to avoid borrowing conflicts
            let mut action_select: Option<CollectionId> = None;
            let mut action_learn: Option<CollectionId> = None;
            let mut action_edit: Option<CollectionId> = None;
            let mut action_delete: Option<PendingDelete> = None;

            egui::ScrollArea::vertical()
                .id_source("collections_list")
                .max_height(150.0)
                .show(ui, |ui| {
                    for (i, collection) in self.collections.iter().enumerate() {
                        let is_selected = self.selected_collection == Some(collection.id);
                        let nesting = if collection.parent_id.is_some() { "  ↳ " } else { "" };

                        ui.horizontal(|ui| {
                            if ui
                                .selectable_label(
                                    is_selected,
                                    format!(
                                        "{}{}. {} ({} cards, {} sub)",
                                        nesting,
                                        i + 1,
                                        collection.title,
                                        collection.flash_card_count,
                                        collection.children_count
                                    ),
                                )
                                .clicked()
                            {
                                action_select = Some(collection.id);
                            }

                            if ui.button("Learn").clicked() {
                                action_learn = Some(collection.id);
                            }
                            if ui.button("Edit").clicked() {
                                action_edit = Some(collection.id);
                            }
                            if ui.button("Delete").clicked() {
                                action_delete = Some(PendingDelete::Collection {
                                    id: collection.id,
                                    title: collection.title.clone(),
                                });
                            }
                        });
                    }
                });

            // Execute deferred actions
            if let Some(id) = action_select {
                self.select_collection(id);
            }
            if let Some(id) = action_edit {
                if let Some(collection) = self.collections.iter().find(|c| c.id == id) {
                    self.edit_title = collection.title.clone();
                    self.edit_description = collection.description.clone();
                    self.editing_collection = Some(id);
                }
            }
            if action_delete.is_some() {
                self.pending_delete = action_delete;
            }
            if let Some(id) = action_learn {
                self.start_learning_session(id, ctx);
            }

            ui.separator();

            self.render_selected_collection(ui);
        });
    }

    /// Without a local store there is no listing; the user names the collection directly.
    fn render_remote_picker(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.heading("Start a Learn Session");
        ui.horizontal(|ui| {
            ui.label("Collection id:");
            ui.text_edit_singleline(&mut self.collection_id_input);
        });
        if ui.button("Learn").clicked() {
            match self.collection_id_input.trim().parse::<CollectionId>() {
                Ok(id) => self.start_learning_session(id, ctx),
                Err(_) => self.show_message(format!(
                    "'{}' is not a valid collection id.",
                    self.collection_id_input
                )),
            }
        }
    }

    /// Flashcard management for the selected collection
    fn render_selected_collection(&mut self, ui: &mut egui::Ui) {
        let Some(collection) = self.selected_summary() else {
            ui.label("Select a collection to add flashcards");
            return;
        };
        let collection_id = collection.id;
        ui.heading(format!("Selected Collection: {}", collection.title));
        if !collection.description.is_empty() {
            ui.label(collection.description.clone());
        }

        ui.horizontal(|ui| {
            ui.label("Term:");
            ui.text_edit_singleline(&mut self.current_term);
        });

        ui.horizontal(|ui| {
            ui.label("Definition:");
            ui.text_edit_singleline(&mut self.current_definition);
        });
        if ui.button("Add Flashcard").clicked()
            && !self.current_term.is_empty()
            && !self.current_definition.is_empty()
        {
            self.handle_add_flashcard(collection_id);
        }

        ui.separator();

        ui.heading(format!("Flashcards ({})", self.selected_cards.len()));

        let mut search_changed = false;
        let mut delete_checked = false;
        ui.horizontal(|ui| {
            ui.label("Search:");
            search_changed = ui.text_edit_singleline(&mut self.search_text).changed();
            let label = format!("Delete Selected ({})", self.checked_cards.len());
            delete_checked = ui
                .add_enabled(!self.checked_cards.is_empty(), egui::Button::new(label))
                .clicked();
        });

        let mut card_action: Option<CardAction> = None;

        egui::ScrollArea::vertical()
            .id_source("flashcards_list")
            .max_height(200.0)
            .show(ui, |ui| {
                for (i, flashcard) in self.selected_cards.iter().enumerate() {
                    ui.group(|ui| {
                        if self.editing_card == Some(flashcard.id) {
                            ui.horizontal(|ui| {
                                ui.label("Term:");
                                ui.text_edit_singleline(&mut self.edit_term);
                            });
                            ui.horizontal(|ui| {
                                ui.label("Definition:");
                                ui.text_edit_singleline(&mut self.edit_definition);
                            });
                            ui.horizontal(|ui| {
                                if ui.button("Save").clicked() {
                                    card_action = Some(CardAction::SaveEdit(flashcard.id));
                                }
                                if ui.button("Cancel").clicked() {
                                    card_action = Some(CardAction::CancelEdit);
                                }
                            });
                            return;
                        }

                        ui.horizontal(|ui| {
                            let mut checked = self.checked_cards.contains(&flashcard.id);
                            if ui.checkbox(&mut checked, "").changed() {
                                card_action = Some(CardAction::ToggleChecked(flashcard.id));
                            }
                            ui.label(format!("{}. Term: {}", i + 1, flashcard.term));
                            if ui.small_button("Edit").clicked() {
                                card_action = Some(CardAction::StartEdit(flashcard.id));
                            }
                        });
                        ui.label(format!("   Definition: {}", flashcard.definition));
                        ui.label(format!("   Score: {}", flashcard.score));
                    });
                }
            });

        if search_changed {
            self.reload_cards();
        }
        if delete_checked {
            let mut ids: Vec<CardId> = self.checked_cards.iter().copied().collect();
            ids.sort_unstable();
            self.pending_delete = Some(PendingDelete::Flashcards(ids));
        }
        if let Some(action) = card_action {
            self.handle_card_action(action);
        }
    }

    fn handle_card_action(&mut self, action: CardAction) {
        match action {
            CardAction::ToggleChecked(id) => {
                if !self.checked_cards.remove(&id) {
                    self.checked_cards.insert(id);
                }
            }
            CardAction::StartEdit(id) => {
                if let Some(card) = self.selected_cards.iter().find(|c| c.id == id) {
                    self.edit_term = card.term.clone();
                    self.edit_definition = card.definition.clone();
                    self.editing_card = Some(id);
                }
            }
            CardAction::SaveEdit(id) => {
                let Some(store) = &self.store else { return };
                if self.edit_term.trim().is_empty() || self.edit_definition.trim().is_empty() {
                    self.show_message("Term and definition must not be empty.".to_string());
                    return;
                }
                match store.update_flashcard(id, self.edit_term.trim(), self.edit_definition.trim()) {
                    Ok(()) => {
                        self.editing_card = None;
                        self.reload_cards();
                    }
                    Err(e) => self.show_message(format!("Failed to update flashcard: {}", e)),
                }
            }
            CardAction::CancelEdit => self.editing_card = None,
        }
    }

    /// Renders the learn session screen for whatever phase the session is in
    fn render_learning_screen(&mut self, ctx: &egui::Context) {
        let mut action: Option<SessionAction> = None;

        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(session) = &self.learning_session else {
                return;
            };

            match session.phase() {
                SessionPhase::Loading => render_waiting(ui, "Loading session...", &mut action),
                SessionPhase::Presenting => render_presenting(ui, ctx, session, &mut action),
                SessionPhase::Reviewing => render_review(ui, session, &mut action),
                SessionPhase::Submitting => render_waiting(ui, "Submitting...", &mut action),
                SessionPhase::Error => render_error(ui, session, &mut action),
                SessionPhase::Closed => {}
            }
        });

        if let Some(action) = action {
            self.handle_session_action(action, ctx);
        }
    }

    fn handle_session_action(&mut self, action: SessionAction, ctx: &egui::Context) {
        let Some(session) = &mut self.learning_session else {
            return;
        };

        match action {
            SessionAction::Flip => session.toggle_definition(),
            SessionAction::Score(delta) => {
                if let Err(e) = session.score_current(delta) {
                    log::debug!("Score ignored: {}", e);
                }
            }
            SessionAction::ToggleRemembered(id) => {
                if let Err(e) = session.toggle_remembered(id) {
                    log::warn!("Toggle ignored: {}", e);
                }
            }
            SessionAction::Continue => {
                if let Err(e) = session.continue_learning() {
                    log::warn!("Continue ignored: {}", e);
                }
            }
            SessionAction::End | SessionAction::RetrySubmit => match session.begin_submit() {
                Ok(Some(updates)) => {
                    self.spawn_call(ctx, move |b| BackendReply::Submitted(b.submit(&updates)));
                }
                Ok(None) => self.finish_session("Nothing to save, no scores changed.".to_string()),
                Err(e) => log::warn!("End session ignored: {}", e),
            },
            SessionAction::RetryLoad => match session.begin_load() {
                Ok((id, count)) => {
                    self.spawn_call(ctx, move |b| BackendReply::Loaded(b.fetch_batch(id, count)));
                }
                Err(e) => log::warn!("Reload ignored: {}", e),
            },
            SessionAction::ExportReport => {
                let report = SessionReport::from_session(&*session);
                self.handle_report_export(&report);
            }
            SessionAction::AskExit => self.show_exit_dialog = true,
            SessionAction::Back => self.leave_session(),
        }
    }

    /// Opens a session and fetches its cards in the background
    fn start_learning_session(&mut self, collection_id: CollectionId, ctx: &egui::Context) {
        let mut session = LearningSession::new(collection_id, self.settings.clone());
        match session.begin_load() {
            Ok((id, count)) => {
                self.spawn_call(ctx, move |b| BackendReply::Loaded(b.fetch_batch(id, count)));
                self.learning_session = Some(session);
                self.current_screen = AppScreen::LearningSession;
            }
            Err(e) => log::error!("Could not start session: {}", e),
        }
    }

    fn handle_create_collection(&mut self) {
        let Some(store) = &self.store else { return };
        match store.create_collection(
            self.new_collection_title.trim(),
            self.new_collection_description.trim(),
            self.new_collection_parent,
        ) {
            Ok(_) => {
                self.new_collection_title.clear();
                self.new_collection_description.clear();
                self.refresh_collections();
            }
            Err(e) => self.show_message(format!("Failed to create collection: {}", e)),
        }
    }

    fn handle_update_collection(&mut self, collection_id: CollectionId) {
        let Some(store) = &self.store else { return };
        if self.edit_title.trim().is_empty() {
            self.show_message("Title must not be empty.".to_string());
            return;
        }
        match store.update_collection(
            collection_id,
            self.edit_title.trim(),
            self.edit_description.trim(),
        ) {
            Ok(()) => {
                self.editing_collection = None;
                self.refresh_collections();
            }
            Err(e) => self.show_message(format!("Failed to update collection: {}", e)),
        }
    }

    fn handle_delete(&mut self, pending: PendingDelete) {
        let Some(store) = &self.store else { return };
        match pending {
            PendingDelete::Collection { id, title } => match store.delete_collection(id) {
                Ok(()) => {
                    self.refresh_collections();
                    // Sub-collections went with it
                    let known = |id: CollectionId| self.collections.iter().any(|c| c.id == id);
                    if self.selected_collection.is_some_and(|s| !known(s)) {
                        self.selected_collection = None;
                        self.selected_cards.clear();
                        self.checked_cards.clear();
                    }
                    if self.new_collection_parent.is_some_and(|p| !known(p)) {
                        self.new_collection_parent = None;
                    }
                    self.show_message(format!("Collection '{}' deleted.", title));
                }
                Err(e) => self.show_message(format!("Failed to delete collection: {}", e)),
            },
            PendingDelete::Flashcards(ids) => match store.delete_flashcards(&ids) {
                Ok(_) => {
                    self.checked_cards.clear();
                    self.refresh_collections();
                    self.reload_cards();
                }
                Err(e) => self.show_message(format!("Failed to delete flashcards: {}", e)),
            },
        }
    }

    fn handle_add_flashcard(&mut self, collection_id: CollectionId) {
        let Some(store) = &self.store else { return };
        match store.add_flashcard(collection_id, &self.current_term, &self.current_definition) {
            Ok(_) => {
                self.current_term.clear();
                self.current_definition.clear();
                self.refresh_collections();
                self.reload_cards();
            }
            Err(e) => self.show_message(format!("Failed to add flashcard: {}", e)),
        }
    }

    /// Handles collection export to JSON file
    fn handle_export(&mut self, collection_id: CollectionId) {
        self.show_export_dialog = false;
        let Some(store) = &self.store else { return };

        let collection = match store.load_collection(collection_id) {
            Ok(collection) => collection,
            Err(e) => {
                self.show_message(format!("Export failed: {}", e));
                return;
            }
        };

        // Open file save dialog
        if let Some(path) = rfd::FileDialog::new()
            .set_file_name(format!("{}.json", collection.title))
            .add_filter("JSON files", &["json"])
            .save_file()
        {
            match export_collection_to_path(&collection, &path) {
                Ok(()) => self.show_message(format!(
                    "Collection '{}' exported successfully!",
                    collection.title
                )),
                Err(e) => self.show_message(format!("Export failed: {}", e)),
            }
        }
    }

    /// Handles collection import from JSON file
    fn handle_import(&mut self) {
        let Some(store) = &self.store else { return };

        // Open file selection dialog
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON files", &["json"])
            .pick_file()
        else {
            return;
        };

        let result = import_collection(&path)
            .map_err(|e| {
                format!(
                    "Import failed: {}\n\nPlease check if the file has correct structure:\n{{\n  \"title\": \"Collection Title\",\n  \"flashcards\": [...]\n}}",
                    e
                )
            })
            .and_then(|collection| {
                store
                    .import_collection(&collection)
                    .map(|_| collection)
                    .map_err(|e| format!("Import failed: {}", e))
            });

        match result {
            Ok(collection) => {
                self.refresh_collections();
                self.show_message(format!(
                    "Collection '{}' imported successfully with {} cards!",
                    collection.title,
                    collection.flashcards.len()
                ));
            }
            Err(message) => self.show_message(message),
        }
    }

    fn handle_report_export(&mut self, report: &SessionReport) {
        if let Some(path) = rfd::FileDialog::new()
            .set_file_name(format!("session-{}.json", report.collection_id))
            .add_filter("JSON files", &["json"])
            .save_file()
        {
            match export_session_report(report, &path) {
                Ok(()) => self.show_message("Session report saved.".to_string()),
                Err(e) => self.show_message(format!("Export failed: {}", e)),
            }
        }
    }
}

/// Spinner for a running backend call. Exit stays available; a late reply is dropped.
fn render_waiting(ui: &mut egui::Ui, text: &str, action: &mut Option<SessionAction>) {
    ui.horizontal(|ui| {
        ui.spinner();
        ui.label(text);
    });
    ui.add_space(10.0);
    if ui.button("Exit").clicked() {
        *action = Some(SessionAction::AskExit);
    }
}

fn render_presenting(
    ui: &mut egui::Ui,
    ctx: &egui::Context,
    session: &LearningSession,
    action: &mut Option<SessionAction>,
) {
    let Some(card) = session.current_card() else {
        return;
    };

    ui.horizontal(|ui| {
        ui.heading("Learn Session");
        if ui.button("Exit").clicked() {
            *action = Some(SessionAction::AskExit);
        }
    });
    ui.label(session.phase_message());

    let remembered = session.remembered_count();
    let total = session.total_count();
    ui.label(format!(
        "Progress: {} / {} remembered    Current loop: {} / {}",
        remembered,
        total,
        session.round_position(),
        session.round_size()
    ));
    ui.add(egui::ProgressBar::new(remembered as f32 / total.max(1) as f32));

    ui.add_space(20.0);

    ui.group(|ui| {
        ui.set_min_height(200.0);
        ui.vertical_centered(|ui| {
            ui.add_space(20.0);
            ui.heading("Term:");
            ui.label(&card.flashcard.term);
            ui.add_space(20.0);

            if session.show_definition {
                ui.heading("Definition:");
                ui.label(&card.flashcard.definition);
            } else {
                ui.label("(Click 'Show Definition' to reveal)");
            }
            ui.add_space(20.0);
        });
    });

    ui.add_space(20.0);

    let locked = session.is_transitioning();
    let flip_label = if session.show_definition {
        "Hide Definition"
    } else {
        "Show Definition"
    };
    if ui.add_enabled(!locked, egui::Button::new(flip_label)).clicked() {
        *action = Some(SessionAction::Flip);
    }

    ui.label("How well do you know this card?");
    let range = session.settings().score_range;
    ui.horizontal_wrapped(|ui| {
        for delta in (-range..=range).filter(|&d| d != 0) {
            let fill = if delta > 0 {
                egui::Color32::from_rgb(34, 139, 34)
            } else {
                egui::Color32::from_rgb(178, 34, 34)
            };
            let button = egui::Button::new(
                egui::RichText::new(format!("{:+}", delta)).color(egui::Color32::WHITE),
            )
            .fill(fill);
            if ui.add_enabled(!locked, button).clicked() {
                *action = Some(SessionAction::Score(delta));
            }
        }
    });
    ui.small("Negative scores for cards you don't know well, positive for cards you know well");

    if locked {
        if let Some(cooldown) = session.settings().transition_cooldown {
            ctx.request_repaint_after(cooldown);
        }
    }
}

fn render_review(ui: &mut egui::Ui, session: &LearningSession, action: &mut Option<SessionAction>) {
    ui.heading("Session Review");

    if session.total_count() == 0 {
        ui.label("No cards available for this session.");
    } else {
        ui.label("Great job! Click on any card you want to practice again.");
    }
    ui.add_space(10.0);

    egui::ScrollArea::vertical()
        .id_source("review_list")
        .max_height(400.0)
        .show(ui, |ui| {
            for card in session.cards() {
                let status = if card.is_remembered() {
                    "✓ Remembered"
                } else {
                    "↻ Practice again"
                };
                let text = format!(
                    "{} - {}    {:+}    {}",
                    card.flashcard.term,
                    card.flashcard.definition,
                    card.total_score_modification(),
                    status
                );
                if ui.selectable_label(!card.is_remembered(), text).clicked() {
                    *action = Some(SessionAction::ToggleRemembered(card.id()));
                }
            }
        });

    ui.add_space(10.0);

    ui.horizontal(|ui| {
        let continue_label = format!("Continue Learning ({} cards)", session.remaining_count());
        if ui
            .add_enabled(session.can_continue(), egui::Button::new(continue_label))
            .clicked()
        {
            *action = Some(SessionAction::Continue);
        }
        if ui.button("End Session").clicked() {
            *action = Some(SessionAction::End);
        }
        if ui.button("Export Report").clicked() {
            *action = Some(SessionAction::ExportReport);
        }
        if ui.button("Exit").clicked() {
            *action = Some(SessionAction::AskExit);
        }
    });
}

fn render_error(ui: &mut egui::Ui, session: &LearningSession, action: &mut Option<SessionAction>) {
    let error = session.last_error();
    if let Some(error) = error {
        ui.colored_label(egui::Color32::RED, error.to_string());
    }
    ui.add_space(10.0);

    ui.horizontal(|ui| match error {
        Some(SessionError::SubmitFailure(_)) => {
            if ui.button("Retry").clicked() {
                *action = Some(SessionAction::RetrySubmit);
            }
            if ui.button("Discard and Exit").clicked() {
                *action = Some(SessionAction::AskExit);
            }
        }
        _ => {
            if ui.button("Retry").clicked() {
                *action = Some(SessionAction::RetryLoad);
            }
            if ui.button("Back to Collections").clicked() {
                *action = Some(SessionAction::Back);
            }
        }
    });
}
