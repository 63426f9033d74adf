//! Learn session management.
//! Handles multi-round flashcard practice: cards are reshuffled into new rounds
//! until every card has been answered correctly twice in a row.

use super::shuffle::shuffle;
use super::{CardId, CollectionId, Flashcard, ScoreUpdate, SessionCard};
use crate::backend::{BackendError, CardSource, ScoreSink};
use crate::error::{PreconditionViolation, Result, SessionError};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const DEFAULT_CARDS_PER_SESSION: usize = 10;
pub const DEFAULT_SCORE_RANGE: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Loading,
    Presenting,
    Reviewing,
    Submitting,
    Error,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub cards_per_session: usize,
    /// Largest accepted score magnitude.
    pub score_range: i32,
    /// Minimum time between two scores.
    pub transition_cooldown: Option<Duration>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cards_per_session: DEFAULT_CARDS_PER_SESSION,
            score_range: DEFAULT_SCORE_RANGE,
            transition_cooldown: None,
        }
    }
}

/// What a scoring event led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOutcome {
    /// Moved to the next card of the same round.
    Advanced,
    /// The round ended and a new one began with the still unremembered cards.
    NewRound { round_number: usize, size: usize },
    /// Every card is remembered; the session is now in review.
    Completed,
}

/// Manages a learn session with multiple rounds.
/// Cards are kept once, in load order, and rounds refer to them by id.
pub struct LearningSession<R: Rng = StdRng> {
    collection_id: CollectionId,
    settings: SessionSettings,
    cards: Vec<SessionCard>,
    positions: HashMap<CardId, usize>,
    current_round: Vec<CardId>,
    current_index: usize,
    round_number: usize,
    phase: SessionPhase,
    loaded: bool,
    last_error: Option<SessionError>,
    pub show_definition: bool,
    locked_until: Option<Instant>,
    rng: R,
}

impl LearningSession {
    /// Creates a session for a collection. It starts in `Loading` with no cards.
    pub fn new(collection_id: CollectionId, settings: SessionSettings) -> Self {
        Self::with_rng(collection_id, settings, StdRng::from_entropy())
    }
}

impl<R: Rng> LearningSession<R> {
    pub fn with_rng(collection_id: CollectionId, settings: SessionSettings, rng: R) -> Self {
        Self {
            collection_id,
            settings,
            cards: Vec::new(),
            positions: HashMap::new(),
            current_round: Vec::new(),
            current_index: 0,
            round_number: 0,
            phase: SessionPhase::Loading,
            loaded: false,
            last_error: None,
            show_definition: false,
            locked_until: None,
            rng,
        }
    }

    fn violation(&self, operation: &'static str) -> SessionError {
        PreconditionViolation::InvalidPhase {
            operation,
            phase: self.phase,
        }
        .into()
    }

    /// Fetches the batch from `source` and starts the first round.
    pub fn load(&mut self, source: &dyn CardSource) -> Result<()> {
        let (collection_id, count) = self.begin_load()?;
        let result = source.fetch_batch(collection_id, count);
        self.finish_load(result)
    }

    /// Enters `Loading` and returns what to fetch. Allowed before the first load
    /// and after a failed one.
    pub fn begin_load(&mut self) -> Result<(CollectionId, usize)> {
        let retrying = self.phase == SessionPhase::Error && !self.loaded;
        if self.phase != SessionPhase::Loading && !retrying {
            return Err(self.violation("load"));
        }
        self.phase = SessionPhase::Loading;
        self.last_error = None;
        Ok((self.collection_id, self.settings.cards_per_session))
    }

    /// Applies the outcome of a fetch started with [`begin_load`](Self::begin_load).
    pub fn finish_load(&mut self, result: std::result::Result<Vec<Flashcard>, BackendError>) -> Result<()> {
        if self.phase != SessionPhase::Loading {
            return Err(self.violation("finish_load"));
        }

        let flashcards = match result {
            Ok(flashcards) => flashcards,
            Err(e) => {
                log::error!("Loading collection {} failed: {}", self.collection_id, e);
                let error = SessionError::FetchFailure(e.to_string());
                self.phase = SessionPhase::Error;
                self.last_error = Some(error.clone());
                return Err(error);
            }
        };

        for flashcard in flashcards {
            if self.positions.contains_key(&flashcard.id) {
                log::warn!("Ignoring duplicate flashcard {} in batch", flashcard.id);
                continue;
            }
            self.positions.insert(flashcard.id, self.cards.len());
            self.cards.push(SessionCard::new(flashcard));
        }
        self.loaded = true;

        log::info!(
            "Loaded {} cards from collection {}",
            self.cards.len(),
            self.collection_id
        );

        if self.cards.is_empty() {
            self.phase = SessionPhase::Reviewing;
        } else {
            self.start_round();
            self.phase = SessionPhase::Presenting;
        }
        Ok(())
    }

    fn unremembered_ids(&self) -> Vec<CardId> {
        self.cards
            .iter()
            .filter(|c| !c.is_remembered())
            .map(SessionCard::id)
            .collect()
    }

    /// Shuffles every unremembered card into a fresh round.
    fn start_round(&mut self) {
        let remaining = self.unremembered_ids();
        self.current_round = shuffle(&remaining, &mut self.rng);
        self.current_index = 0;
        self.show_definition = false;
        self.round_number += 1;
        log::info!(
            "Round {} started with {} cards",
            self.round_number,
            self.current_round.len()
        );
    }

    fn card(&self, id: CardId) -> Option<&SessionCard> {
        self.positions.get(&id).and_then(|&idx| self.cards.get(idx))
    }

    fn card_mut(&mut self, id: CardId) -> Option<&mut SessionCard> {
        match self.positions.get(&id) {
            Some(&idx) => self.cards.get_mut(idx),
            None => None,
        }
    }

    fn current_card_id(&self) -> Option<CardId> {
        if self.phase != SessionPhase::Presenting {
            return None;
        }
        self.current_round.get(self.current_index).copied()
    }

    pub fn current_card(&self) -> Option<&SessionCard> {
        self.current_card_id().and_then(|id| self.card(id))
    }

    pub fn toggle_definition(&mut self) {
        self.show_definition = !self.show_definition;
    }

    /// True while the cooldown after the previous score is still running.
    pub fn is_transitioning(&self) -> bool {
        self.locked_until
            .is_some_and(|until| Instant::now() < until)
    }

    /// Scores whichever card is being presented.
    pub fn score_current(&mut self, delta: i32) -> Result<ScoreOutcome> {
        match self.current_card_id() {
            Some(id) => self.score(id, delta),
            None => Err(self.violation("score")),
        }
    }

    /// Records `delta` for the card being presented and moves the session on.
    pub fn score(&mut self, card_id: CardId, delta: i32) -> Result<ScoreOutcome> {
        if self.phase != SessionPhase::Presenting {
            return Err(self.violation("score"));
        }
        let range = self.settings.score_range;
        if delta == 0 || !(-range..=range).contains(&delta) {
            return Err(PreconditionViolation::InvalidScore { delta, range }.into());
        }
        let expected = self.current_card_id();
        if expected != Some(card_id) {
            return Err(PreconditionViolation::NotCurrentCard {
                expected,
                actual: card_id,
            }
            .into());
        }
        if self.is_transitioning() {
            return Err(PreconditionViolation::TransitionLocked.into());
        }

        if let Some(card) = self.card_mut(card_id) {
            let retired = card.record_score(delta);
            log::debug!(
                "Card {} scored {:+} (total {:+}, retired: {})",
                card_id,
                delta,
                card.total_score_modification(),
                retired
            );
        }
        if let Some(cooldown) = self.settings.transition_cooldown {
            self.locked_until = Some(Instant::now() + cooldown);
        }

        Ok(self.advance())
    }

    fn advance(&mut self) -> ScoreOutcome {
        if self.current_index + 1 < self.current_round.len() {
            self.current_index += 1;
            self.show_definition = false;
            return ScoreOutcome::Advanced;
        }

        // End of round. Cards passed earlier may have retired, so look at all cards.
        if self.cards.iter().all(SessionCard::is_remembered) {
            self.current_round.clear();
            self.current_index = 0;
            self.phase = SessionPhase::Reviewing;
            log::info!(
                "All {} cards remembered after {} rounds",
                self.cards.len(),
                self.round_number
            );
            ScoreOutcome::Completed
        } else {
            self.start_round();
            ScoreOutcome::NewRound {
                round_number: self.round_number,
                size: self.current_round.len(),
            }
        }
    }

    /// Manual override from the review list.
    pub fn toggle_remembered(&mut self, card_id: CardId) -> Result<()> {
        if self.phase != SessionPhase::Reviewing {
            return Err(self.violation("toggle_remembered"));
        }
        match self.card_mut(card_id) {
            Some(card) => {
                card.toggle_remembered();
                Ok(())
            }
            None => Err(PreconditionViolation::UnknownCard(card_id).into()),
        }
    }

    pub fn can_continue(&self) -> bool {
        self.phase == SessionPhase::Reviewing && self.cards.iter().any(|c| !c.is_remembered())
    }

    /// Starts another round with the cards currently marked as not remembered.
    pub fn continue_learning(&mut self) -> Result<()> {
        if self.phase != SessionPhase::Reviewing {
            return Err(self.violation("continue_learning"));
        }
        if !self.can_continue() {
            return Err(PreconditionViolation::NothingToContinue.into());
        }
        self.start_round();
        self.phase = SessionPhase::Presenting;
        Ok(())
    }

    /// Score changes to submit: every card with a nonzero accumulated modification.
    pub fn changed_summary(&self) -> Vec<ScoreUpdate> {
        self.cards
            .iter()
            .filter(|c| c.total_score_modification() != 0)
            .map(|c| ScoreUpdate {
                flash_card_id: c.id(),
                score_modification: c.total_score_modification(),
                times_learned: c.times_learned(),
            })
            .collect()
    }

    /// Submits the results to `sink` and closes the session.
    pub fn end_session(&mut self, sink: &dyn ScoreSink) -> Result<()> {
        match self.begin_submit()? {
            Some(updates) => {
                let result = sink.submit(&updates);
                self.finish_submit(result)
            }
            None => Ok(()),
        }
    }

    /// Enters `Submitting` and returns the payload. Returns `None` when nothing
    /// changed; the session is then closed without contacting the sink.
    /// Allowed from review and after a failed submit.
    pub fn begin_submit(&mut self) -> Result<Option<Vec<ScoreUpdate>>> {
        let retrying = self.phase == SessionPhase::Error && self.loaded;
        if self.phase != SessionPhase::Reviewing && !retrying {
            return Err(self.violation("end_session"));
        }
        self.last_error = None;

        let updates = self.changed_summary();
        if updates.is_empty() {
            log::info!("No score changes in session, closing without submit");
            self.phase = SessionPhase::Closed;
            return Ok(None);
        }
        self.phase = SessionPhase::Submitting;
        Ok(Some(updates))
    }

    /// Applies the outcome of a submit started with [`begin_submit`](Self::begin_submit).
    pub fn finish_submit(&mut self, result: std::result::Result<(), BackendError>) -> Result<()> {
        if self.phase == SessionPhase::Closed {
            log::warn!("Ignoring submit outcome for a session that was exited");
            return Ok(());
        }
        if self.phase != SessionPhase::Submitting {
            return Err(self.violation("finish_submit"));
        }

        match result {
            Ok(()) => {
                log::info!(
                    "Submitted {} score updates for collection {}",
                    self.changed_summary().len(),
                    self.collection_id
                );
                self.phase = SessionPhase::Closed;
                Ok(())
            }
            Err(e) => {
                log::error!("Submitting scores failed: {}", e);
                let error = SessionError::SubmitFailure(e.to_string());
                self.phase = SessionPhase::Error;
                self.last_error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Leaves the session without submitting. Progress is discarded.
    pub fn exit(&mut self) {
        if self.phase != SessionPhase::Closed {
            log::info!("Session for collection {} exited", self.collection_id);
        }
        self.phase = SessionPhase::Closed;
        self.current_round.clear();
        self.current_index = 0;
        self.locked_until = None;
    }

    pub fn collection_id(&self) -> CollectionId {
        self.collection_id
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    /// Every card of the session in load order, for the review list.
    pub fn cards(&self) -> &[SessionCard] {
        &self.cards
    }

    pub fn remembered_count(&self) -> usize {
        self.cards.iter().filter(|c| c.is_remembered()).count()
    }

    pub fn total_count(&self) -> usize {
        self.cards.len()
    }

    pub fn remaining_count(&self) -> usize {
        self.total_count() - self.remembered_count()
    }

    /// 1-based position of the presented card within the round.
    pub fn round_position(&self) -> usize {
        if self.current_round.is_empty() {
            0
        } else {
            self.current_index + 1
        }
    }

    pub fn round_size(&self) -> usize {
        self.current_round.len()
    }

    pub fn round_number(&self) -> usize {
        self.round_number
    }

    pub fn phase_message(&self) -> String {
        if self.round_number <= 1 {
            format!("Round {}: {} cards", self.round_number.max(1), self.round_size())
        } else {
            format!(
                "Round {} (Review): {} cards to retry",
                self.round_number,
                self.round_size()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn flashcard(id: CardId) -> Flashcard {
        Flashcard {
            id,
            term: format!("term {}", id),
            definition: format!("definition {}", id),
            score: 0,
            collection_id: 1,
        }
    }

    struct FixedSource(Vec<Flashcard>);

    impl CardSource for FixedSource {
        fn fetch_batch(&self, _: CollectionId, count: usize) -> crate::backend::Result<Vec<Flashcard>> {
            Ok(self.0.iter().take(count).cloned().collect())
        }
    }

    struct FailingSource;

    impl CardSource for FailingSource {
        fn fetch_batch(&self, id: CollectionId, _: usize) -> crate::backend::Result<Vec<Flashcard>> {
            Err(BackendError::CollectionNotFound(id))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<Vec<ScoreUpdate>>>,
        fail: bool,
    }

    impl ScoreSink for RecordingSink {
        fn submit(&self, updates: &[ScoreUpdate]) -> crate::backend::Result<()> {
            self.calls.lock().unwrap().push(updates.to_vec());
            if self.fail {
                Err(BackendError::Api {
                    status: 503,
                    message: "Service Unavailable".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn session_with(ids: &[CardId], seed: u64) -> LearningSession<StdRng> {
        let mut session =
            LearningSession::with_rng(1, SessionSettings::default(), StdRng::seed_from_u64(seed));
        let cards = ids.iter().map(|&id| flashcard(id)).collect();
        session.load(&FixedSource(cards)).unwrap();
        session
    }

    fn current_id<R: Rng>(session: &LearningSession<R>) -> CardId {
        session.current_card().map(SessionCard::id).unwrap()
    }

    fn card<R: Rng>(session: &LearningSession<R>, id: CardId) -> &SessionCard {
        session.cards().iter().find(|c| c.id() == id).unwrap()
    }

    /// Scores each presented card with whatever `pick` returns until review.
    fn run_until_review<R: Rng>(
        session: &mut LearningSession<R>,
        mut pick: impl FnMut(CardId) -> i32,
    ) {
        for _ in 0..1000 {
            if session.phase() != SessionPhase::Presenting {
                return;
            }
            let id = current_id(session);
            session.score(id, pick(id)).unwrap();
        }
        panic!("session did not reach review");
    }

    #[test]
    fn test_load_starts_first_round() {
        let session = session_with(&[1, 2, 3], 1);
        assert_eq!(session.phase(), SessionPhase::Presenting);
        assert_eq!(session.round_number(), 1);
        assert_eq!(session.round_size(), 3);
        assert_eq!(session.round_position(), 1);
        assert_eq!(session.total_count(), 3);

        let mut round: Vec<_> = session.current_round.clone();
        round.sort_unstable();
        assert_eq!(round, vec![1, 2, 3]);
    }

    #[test]
    fn test_load_respects_cards_per_session() {
        let mut session = LearningSession::with_rng(
            1,
            SessionSettings {
                cards_per_session: 2,
                ..SessionSettings::default()
            },
            StdRng::seed_from_u64(1),
        );
        let cards = (1..=5).map(flashcard).collect();
        session.load(&FixedSource(cards)).unwrap();
        assert_eq!(session.total_count(), 2);
    }

    #[test]
    fn test_duplicate_ids_are_collapsed() {
        let session = session_with(&[1, 2, 1], 4);
        assert_eq!(session.total_count(), 2);
        assert_eq!(session.round_size(), 2);
    }

    #[test]
    fn test_empty_batch_goes_straight_to_review() {
        let session = session_with(&[], 1);
        assert_eq!(session.phase(), SessionPhase::Reviewing);
        assert!(session.current_card().is_none());
        assert!(!session.can_continue());
    }

    #[test]
    fn test_fetch_failure_then_retry() {
        let mut session = LearningSession::with_rng(5, SessionSettings::default(), StdRng::seed_from_u64(1));
        let err = session.load(&FailingSource).unwrap_err();
        assert!(matches!(err, SessionError::FetchFailure(_)));
        assert_eq!(session.phase(), SessionPhase::Error);
        assert_eq!(session.last_error(), Some(&err));

        session.load(&FixedSource(vec![flashcard(1)])).unwrap();
        assert_eq!(session.phase(), SessionPhase::Presenting);
        assert!(session.last_error().is_none());
    }

    #[test]
    fn test_load_twice_is_rejected() {
        let mut session = session_with(&[1], 1);
        let err = session.load(&FixedSource(vec![flashcard(2)])).unwrap_err();
        assert!(matches!(err, SessionError::Precondition(PreconditionViolation::InvalidPhase { .. })));
        assert_eq!(session.total_count(), 1);
    }

    #[test]
    fn test_positive_scores_in_consecutive_rounds_retire() {
        // A:+3 in round 1, A:+1 in round 2 -> window [3, 1], retired.
        let mut session = session_with(&[1, 2, 3], 11);
        let mut a_scores = vec![3, 1].into_iter();

        while !card(&session, 1).is_remembered() {
            let id = current_id(&session);
            let delta = if id == 1 { a_scores.next().unwrap() } else { -1 };
            session.score(id, delta).unwrap();
        }

        let a = card(&session, 1);
        assert_eq!(a.last_two_scores(), &[3, 1]);
        assert_eq!(a.total_score_modification(), 4);
        assert_eq!(a.times_learned(), 2);
        assert!(a_scores.next().is_none());
    }

    #[test]
    fn test_window_drops_old_score_before_retiring() {
        // A:-3, then +1 twice. The -3 leaves the window and A retires on [1, 1].
        let mut session = session_with(&[1, 2, 3], 11);
        let mut a_scores = vec![-3, 1, 1].into_iter();

        while !card(&session, 1).is_remembered() {
            let id = current_id(&session);
            let delta = if id == 1 { a_scores.next().unwrap() } else { -1 };
            session.score(id, delta).unwrap();
        }

        let a = card(&session, 1);
        assert_eq!(a.last_two_scores(), &[1, 1]);
        assert_eq!(a.total_score_modification(), -1);
        assert_eq!(a.times_learned(), 3);
        assert!(a_scores.next().is_none());
        // A left the rotation; B and C still need work.
        assert_eq!(session.phase(), SessionPhase::Presenting);
    }

    #[test]
    fn test_requeue_scenario_keeps_only_unremembered() {
        // A:-2, B:+2, A:+2 within rounds; B:+2 again retires B.
        let mut session = session_with(&[1, 2], 3);
        let mut scripted: HashMap<CardId, Vec<i32>> = HashMap::new();
        scripted.insert(1, vec![-2, 2]);
        scripted.insert(2, vec![2, 2]);

        // Round 1 and round 2 both contain A and B.
        for _ in 0..4 {
            let id = current_id(&session);
            let delta = scripted.get_mut(&id).unwrap().remove(0);
            session.score(id, delta).unwrap();
        }

        assert!(!card(&session, 1).is_remembered());
        assert_eq!(card(&session, 1).last_two_scores(), &[-2, 2]);
        assert!(card(&session, 2).is_remembered());

        assert_eq!(session.phase(), SessionPhase::Presenting);
        assert_eq!(session.round_number(), 3);
        assert_eq!(session.current_round, vec![1]);
    }

    #[test]
    fn test_round_end_uses_all_cards_not_stale_batch() {
        let mut session = session_with(&[1, 2, 3], 8);
        // Round 1: everything positive once, nobody retires.
        run_round(&mut session, |_| 1);
        assert_eq!(session.round_number(), 2);
        assert_eq!(session.round_size(), 3);

        // Round 2: every card's second positive retires it mid-round.
        let outcome = run_round(&mut session, |_| 1);
        assert_eq!(outcome, ScoreOutcome::Completed);
        assert_eq!(session.phase(), SessionPhase::Reviewing);
    }

    fn run_round<R: Rng>(session: &mut LearningSession<R>, pick: impl Fn(CardId) -> i32) -> ScoreOutcome {
        let size = session.round_size();
        let mut outcome = ScoreOutcome::Advanced;
        for _ in 0..size {
            let id = current_id(session);
            outcome = session.score(id, pick(id)).unwrap();
        }
        outcome
    }

    #[test]
    fn test_single_card_needs_two_rounds() {
        let mut session = session_with(&[1], 1);
        assert_eq!(
            session.score(1, 1).unwrap(),
            ScoreOutcome::NewRound { round_number: 2, size: 1 }
        );
        assert_eq!(session.score(1, 1).unwrap(), ScoreOutcome::Completed);
        assert_eq!(session.phase(), SessionPhase::Reviewing);
        assert_eq!(session.round_number(), 2);
    }

    #[test]
    fn test_round_retiring_every_card_goes_straight_to_review() {
        let mut session = session_with(&[1, 2], 4);
        run_until_review(&mut session, |_| 2);
        let rounds = session.round_number();

        session.toggle_remembered(1).unwrap();
        session.toggle_remembered(2).unwrap();
        session.continue_learning().unwrap();

        // Both windows already end in a positive score, one more retires each card.
        assert_eq!(session.score_current(1).unwrap(), ScoreOutcome::Advanced);
        assert_eq!(session.score_current(1).unwrap(), ScoreOutcome::Completed);
        assert_eq!(session.phase(), SessionPhase::Reviewing);
        assert_eq!(session.round_number(), rounds + 1);
    }

    #[test]
    fn test_review_is_sticky_until_command() {
        let mut session = session_with(&[1, 2], 2);
        run_until_review(&mut session, |_| 3);
        assert_eq!(session.phase(), SessionPhase::Reviewing);
        assert_eq!(session.remembered_count(), 2);

        assert!(session.score(1, 1).is_err());
        assert!(session.score_current(1).is_err());
        assert_eq!(session.phase(), SessionPhase::Reviewing);
    }

    #[test]
    fn test_toggle_then_continue_learning() {
        let mut session = session_with(&[1, 2, 3], 5);
        run_until_review(&mut session, |_| 2);
        assert!(!session.can_continue());
        assert!(matches!(
            session.continue_learning(),
            Err(SessionError::Precondition(PreconditionViolation::NothingToContinue))
        ));

        let before = card(&session, 2).clone();
        session.toggle_remembered(2).unwrap();
        assert!(session.can_continue());

        session.continue_learning().unwrap();
        assert_eq!(session.phase(), SessionPhase::Presenting);
        assert_eq!(session.current_round, vec![2]);
        assert_eq!(session.round_position(), 1);

        let after = card(&session, 2);
        assert!(!after.is_remembered());
        assert_eq!(after.total_score_modification(), before.total_score_modification());
        assert_eq!(after.last_two_scores(), before.last_two_scores());
        assert_eq!(after.times_learned(), before.times_learned());
    }

    #[test]
    fn test_toggle_requires_review_and_known_card() {
        let mut session = session_with(&[1], 1);
        assert!(session.toggle_remembered(1).is_err());

        run_until_review(&mut session, |_| 1);
        assert!(matches!(
            session.toggle_remembered(42),
            Err(SessionError::Precondition(PreconditionViolation::UnknownCard(42)))
        ));
        session.toggle_remembered(1).unwrap();
        session.toggle_remembered(1).unwrap();
        assert!(card(&session, 1).is_remembered());
    }

    #[test]
    fn test_score_preconditions_leave_state_untouched() {
        let mut session = session_with(&[1, 2], 9);
        let current = current_id(&session);
        let other = if current == 1 { 2 } else { 1 };

        assert!(matches!(
            session.score(current, 0),
            Err(SessionError::Precondition(PreconditionViolation::InvalidScore { delta: 0, range: 5 }))
        ));
        assert!(session.score(current, 6).is_err());
        assert!(session.score(current, -6).is_err());
        assert!(matches!(
            session.score(current, i32::MIN),
            Err(SessionError::Precondition(PreconditionViolation::InvalidScore { .. }))
        ));
        assert!(session.score(current, i32::MAX).is_err());
        assert!(matches!(
            session.score(other, 1),
            Err(SessionError::Precondition(PreconditionViolation::NotCurrentCard { .. }))
        ));

        assert_eq!(current_id(&session), current);
        assert!(session.cards().iter().all(|c| c.times_learned() == 0));
    }

    #[test]
    fn test_show_definition_resets_on_next_card() {
        let mut session = session_with(&[1, 2], 1);
        session.toggle_definition();
        assert!(session.show_definition);
        session.score_current(-1).unwrap();
        assert!(!session.show_definition);
    }

    #[test]
    fn test_cooldown_rejects_fast_input() {
        let settings = SessionSettings {
            transition_cooldown: Some(Duration::from_secs(60)),
            ..SessionSettings::default()
        };
        let mut session = LearningSession::with_rng(1, settings, StdRng::seed_from_u64(1));
        session
            .load(&FixedSource(vec![flashcard(1), flashcard(2)]))
            .unwrap();

        session.score_current(2).unwrap();
        assert!(session.is_transitioning());
        let position = session.round_position();
        assert!(matches!(
            session.score_current(2),
            Err(SessionError::Precondition(PreconditionViolation::TransitionLocked))
        ));
        assert_eq!(session.round_position(), position);
        assert_eq!(
            session.cards().iter().map(SessionCard::times_learned).sum::<u32>(),
            1
        );
    }

    #[test]
    fn test_no_cooldown_by_default() {
        let mut session = session_with(&[1, 2], 1);
        session.score_current(1).unwrap();
        assert!(!session.is_transitioning());
        session.score_current(1).unwrap();
    }

    #[test]
    fn test_random_score_sequences_hold_invariants() {
        let mut rng = StdRng::seed_from_u64(1234);
        for seed in 0..50 {
            let mut session = session_with(&[1, 2, 3, 4], seed);
            let mut history: HashMap<CardId, Vec<i32>> = HashMap::new();

            for _ in 0..1000 {
                if session.phase() != SessionPhase::Presenting {
                    break;
                }
                let id = current_id(&session);
                let mut delta = rng.gen_range(-5..=5);
                if delta == 0 {
                    delta = 1;
                }
                session.score(id, delta).unwrap();
                history.entry(id).or_default().push(delta);

                for c in session.cards() {
                    let scores = history.get(&c.id()).cloned().unwrap_or_default();
                    let tail: Vec<i32> = scores.iter().rev().take(2).rev().copied().collect();

                    assert!(c.last_two_scores().len() <= 2);
                    assert_eq!(c.last_two_scores(), tail.as_slice());
                    // Once retired a card leaves the rounds, so its window stops moving.
                    assert_eq!(c.is_remembered(), tail.len() == 2 && tail.iter().all(|&s| s > 0));
                    assert_eq!(c.total_score_modification(), scores.iter().sum::<i32>());
                    assert_eq!(c.times_learned() as usize, scores.len());
                }

                let summary = session.changed_summary();
                for c in session.cards() {
                    let listed = summary.iter().any(|u| u.flash_card_id == c.id());
                    assert_eq!(listed, c.total_score_modification() != 0);
                }
                assert!(summary.iter().all(|u| u.score_modification != 0));
            }

            assert_eq!(session.phase(), SessionPhase::Reviewing);
            assert_eq!(session.remembered_count(), session.total_count());
        }
    }

    #[test]
    fn test_changed_summary_excludes_zero_totals() {
        let mut session = session_with(&[1, 2, 3], 6);
        // Give one card +2 and -2 so it nets to zero.
        let first = current_id(&session);
        session.score(first, 2).unwrap();
        session.score_current(-1).unwrap();
        session.score_current(-1).unwrap();
        // Round 2: find `first` and bring it back to zero.
        while current_id(&session) != first {
            session.score_current(-3).unwrap();
        }
        session.score(first, -2).unwrap();

        let summary = session.changed_summary();
        assert!(summary.iter().all(|u| u.flash_card_id != first));
        assert!(summary.iter().all(|u| u.score_modification != 0));
        assert_eq!(card(&session, first).times_learned(), 2);
    }

    #[test]
    fn test_end_session_submits_summary_and_closes() {
        let mut session = session_with(&[1, 2], 2);
        run_until_review(&mut session, |id| if id == 1 { 5 } else { 1 });

        let sink = RecordingSink::default();
        session.end_session(&sink).unwrap();
        assert_eq!(session.phase(), SessionPhase::Closed);

        let calls = sink.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0],
            vec![
                ScoreUpdate { flash_card_id: 1, score_modification: 10, times_learned: 2 },
                ScoreUpdate { flash_card_id: 2, score_modification: 2, times_learned: 2 },
            ]
        );
    }

    #[test]
    fn test_end_session_without_changes_skips_sink() {
        let mut session = session_with(&[], 1);
        let sink = RecordingSink::default();
        session.end_session(&sink).unwrap();
        assert_eq!(session.phase(), SessionPhase::Closed);
        assert!(sink.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_end_session_requires_review() {
        let mut session = session_with(&[1], 1);
        let sink = RecordingSink::default();
        assert!(session.end_session(&sink).is_err());
        assert_eq!(session.phase(), SessionPhase::Presenting);
        assert!(sink.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_submit_failure_keeps_results_for_retry() {
        let mut session = session_with(&[1, 2], 3);
        run_until_review(&mut session, |_| 4);
        let summary = session.changed_summary();

        let failing = RecordingSink { fail: true, ..RecordingSink::default() };
        let err = session.end_session(&failing).unwrap_err();
        assert!(matches!(err, SessionError::SubmitFailure(_)));
        assert_eq!(session.phase(), SessionPhase::Error);
        assert_eq!(session.changed_summary(), summary);

        // A failed submit cannot be followed by a reload.
        assert!(session.begin_load().is_err());

        let working = RecordingSink::default();
        session.end_session(&working).unwrap();
        assert_eq!(session.phase(), SessionPhase::Closed);
        assert_eq!(working.calls.lock().unwrap()[0], summary);
    }

    #[test]
    fn test_exit_during_submit_ignores_outcome() {
        let mut session = session_with(&[1], 1);
        run_until_review(&mut session, |_| 1);

        let updates = session.begin_submit().unwrap().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(session.phase(), SessionPhase::Submitting);

        session.exit();
        assert_eq!(session.phase(), SessionPhase::Closed);
        session
            .finish_submit(Err(BackendError::StoreUnavailable))
            .unwrap();
        assert_eq!(session.phase(), SessionPhase::Closed);
        assert!(session.last_error().is_none());
    }

    #[test]
    fn test_exit_while_loading_drops_late_batch() {
        let mut session =
            LearningSession::with_rng(1, SessionSettings::default(), StdRng::seed_from_u64(1));
        session.begin_load().unwrap();
        session.exit();

        assert!(session.finish_load(Ok(vec![flashcard(1)])).is_err());
        assert_eq!(session.phase(), SessionPhase::Closed);
        assert_eq!(session.total_count(), 0);
        assert!(session.current_card().is_none());
    }

    #[test]
    fn test_exit_from_presenting_discards_round() {
        let mut session = session_with(&[1, 2], 1);
        session.score_current(3).unwrap();
        session.exit();
        assert_eq!(session.phase(), SessionPhase::Closed);
        assert!(session.current_card().is_none());
        assert!(session.score_current(1).is_err());
    }

    #[test]
    fn test_phase_message() {
        let mut session = session_with(&[1, 2], 1);
        assert_eq!(session.phase_message(), "Round 1: 2 cards");
        session.score_current(-1).unwrap();
        session.score_current(-1).unwrap();
        assert_eq!(session.phase_message(), "Round 2 (Review): 2 cards to retry");
    }
}
