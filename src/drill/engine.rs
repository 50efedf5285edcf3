//! Session table and the operations the chat transport drives.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::cache::{CacheStatus, ResultCache};
use super::error::DrillError;
use super::interval::{bucket_minutes, label};
use super::payload::{ProviderPayload, SubmitResponse};
use super::provider::{ProviderError, WordProvider};
use super::reconcile::{reconcile, reverse_records, ReverseCard};
use super::report::{
    CacheCleanupStatus, Encouragement, FinalReport, ReviewLabel, ReviewRow, SubmissionStatus,
};
use super::session::{Advance, SessionPhase, TrainingSession};
use super::types::{PendingResults, PresentedWord, TrainingType, WordRecord};
use crate::config::TrainingConfig;
use crate::constants::MAX_WORD_CHARS;
use crate::store::Store;

type SessionSlot = Arc<Mutex<TrainingSession>>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStarted {
    pub session_id: Uuid,
    pub training_type: TrainingType,
    pub total: usize,
    pub first: PresentedWord,
    pub pending_from_previous: CacheStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "data")]
pub enum AnswerNext {
    Word(PresentedWord),
    Finished(Box<FinalReport>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    pub correct: bool,
    pub correct_option_id: String,
    pub correct_value: String,
    pub next: AnswerNext,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum CancelOutcome {
    NoSession,
    Cancelled,
    NotCancellable { phase: SessionPhase },
    /// Another event for this user is being processed right now.
    Busy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendOutcome {
    pub sent: usize,
    pub intervals_returned: usize,
    pub cleanup: CacheCleanupStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularySync {
    pub total: usize,
    pub added: usize,
    pub updated: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedWord {
    pub word: String,
    pub translation: String,
}

pub struct TrainingEngine {
    provider: Arc<dyn WordProvider>,
    cache: Arc<dyn ResultCache>,
    store: Arc<Store>,
    config: TrainingConfig,
    sessions: RwLock<HashMap<String, SessionSlot>>,
    reports: RwLock<HashMap<String, FinalReport>>,
}

impl TrainingEngine {
    pub fn new(
        provider: Arc<dyn WordProvider>,
        cache: Arc<dyn ResultCache>,
        store: Arc<Store>,
        config: TrainingConfig,
    ) -> Self {
        Self {
            provider,
            cache,
            store,
            config,
            sessions: RwLock::new(HashMap::new()),
            reports: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn session_phase(&self, user_id: &str) -> Option<SessionPhase> {
        let slot = self.slot(user_id).await?;
        let phase = slot.try_lock().ok().map(|s| s.phase());
        phase
    }

    async fn slot(&self, user_id: &str) -> Option<SessionSlot> {
        self.sessions.read().await.get(user_id).cloned()
    }

    async fn remove_slot(&self, user_id: &str, slot: &SessionSlot) {
        let mut sessions = self.sessions.write().await;
        if sessions.get(user_id).is_some_and(|s| Arc::ptr_eq(s, slot)) {
            sessions.remove(user_id);
        }
    }

    /// Starts a quiz. A second start while one is active is rejected; the
    /// slot is claimed before any I/O so concurrent starts cannot interleave.
    pub async fn start_session(
        &self,
        user_id: &str,
        training_type: TrainingType,
    ) -> Result<SessionStarted, DrillError> {
        let mut session = TrainingSession::new(user_id, training_type);
        session.begin_loading()?;
        let slot: SessionSlot = Arc::new(Mutex::new(session));
        let mut guard = slot.lock().await;

        {
            let mut sessions = self.sessions.write().await;
            if sessions.contains_key(user_id) {
                tracing::info!(user_id, "Rejected start, session already active");
                return Err(DrillError::SessionAlreadyActive);
            }
            sessions.insert(user_id.to_string(), slot.clone());
        }
        self.reports.write().await.remove(user_id);

        let started = match self.prepare(&mut guard, user_id, training_type).await {
            Ok(started) => started,
            Err(e) => {
                if guard.phase() == SessionPhase::Loading {
                    let _ = guard.transition(SessionPhase::Idle);
                }
                drop(guard);
                self.remove_slot(user_id, &slot).await;
                tracing::warn!(user_id, training_type = %training_type, error = %e, "Training start failed");
                return Err(e);
            }
        };

        tracing::info!(
            user_id,
            session_id = %started.session_id,
            training_type = %training_type,
            total = started.total,
            "Training started"
        );
        Ok(started)
    }

    async fn prepare(
        &self,
        session: &mut TrainingSession,
        user_id: &str,
        training_type: TrainingType,
    ) -> Result<SessionStarted, DrillError> {
        let pending_from_previous = CacheStatus::of(&self.cache.load(user_id)?);

        let queue = match training_type {
            TrainingType::RemoteSynced => self.remote_queue(user_id).await?,
            TrainingType::LocalOnly => self.local_queue(user_id)?,
        };
        session.load(queue)?;

        let first = session
            .present(&mut rand::thread_rng())
            .ok_or(DrillError::EmptyWords)?;

        Ok(SessionStarted {
            session_id: session.id,
            training_type,
            total: session.queue().len(),
            first,
            pending_from_previous,
        })
    }

    async fn remote_queue(&self, user_id: &str) -> Result<Vec<WordRecord>, DrillError> {
        let payloads = self
            .provider
            .fetch_words(user_id)
            .await
            .map_err(DrillError::from_fetch)?;
        let queue = reconcile(&payloads, self.config.dictionary_batch, &mut rand::thread_rng());
        tracing::debug!(user_id, payloads = payloads.len(), words = queue.len(), "Reconciled provider payloads");
        Ok(queue)
    }

    fn local_queue(&self, user_id: &str) -> Result<Vec<WordRecord>, DrillError> {
        let due = self
            .store
            .due_vocabulary(user_id, Utc::now(), self.config.local_batch)?;
        if due.is_empty() {
            return Err(DrillError::NoVocabulary);
        }
        let cards = due
            .into_iter()
            .map(|e| ReverseCard {
                word_id: e.word_id,
                word: e.word,
                translation: e.translation,
            })
            .collect();
        Ok(reverse_records(cards, &mut rand::thread_rng()))
    }

    /// Scores one answer. For remote sessions the outcome is durable before
    /// the session advances.
    pub async fn submit_answer(
        &self,
        user_id: &str,
        word_index: usize,
        selected_option_id: &str,
    ) -> Result<AnswerOutcome, DrillError> {
        let slot = self.slot(user_id).await.ok_or(DrillError::NoActiveSession)?;
        let mut session = slot.lock().await;

        let scored = session.check_answer(word_index, selected_option_id)?;
        if session.training_type == TrainingType::RemoteSynced {
            self.cache
                .persist_outcome(user_id, &scored.word_id, scored.outcome)?;
        }
        session.apply(&scored)?;

        let (correct_option_id, correct_value) = session
            .queue()
            .get(word_index)
            .map(|w| (w.correct_option_id.clone(), w.correct_option_value.clone()))
            .unwrap_or_default();

        tracing::debug!(
            user_id,
            word_id = %scored.word_id,
            correct = scored.correct(),
            "Answer scored"
        );

        let next = match session.advance()? {
            Advance::Next => {
                let word = session
                    .present(&mut rand::thread_rng())
                    .ok_or(DrillError::NotAcceptingAnswers(session.phase()))?;
                AnswerNext::Word(word)
            }
            Advance::Finished => {
                let finished = self.finish(&mut session).await;
                drop(session);
                self.remove_slot(user_id, &slot).await;
                let report = finished?;
                self.reports
                    .write()
                    .await
                    .insert(user_id.to_string(), report.clone());
                AnswerNext::Finished(Box::new(report))
            }
        };

        Ok(AnswerOutcome {
            correct: scored.correct(),
            correct_option_id,
            correct_value,
            next,
        })
    }

    async fn finish(&self, session: &mut TrainingSession) -> Result<FinalReport, DrillError> {
        match session.training_type {
            TrainingType::RemoteSynced => self.finish_remote(session).await,
            TrainingType::LocalOnly => self.finish_local(session),
        }
    }

    async fn finish_remote(&self, session: &mut TrainingSession) -> Result<FinalReport, DrillError> {
        let user_id = session.user_id.clone();
        session.transition(SessionPhase::Submitting)?;

        let mut batch = match self.cache.load(&user_id) {
            Ok(previous) => previous,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Could not load cached results, sending session results only");
                PendingResults::new()
            }
        };
        let leftover = batch.len().saturating_sub(session.pending_results().len());
        batch.extend(session.pending_results().iter().map(|(k, v)| (k.clone(), *v)));

        let submitted = self.submit(&user_id, &batch).await;
        match submitted {
            Ok(resp) => {
                tracing::info!(user_id = %user_id, words = batch.len(), leftover, "Training results submitted");
                session.transition(SessionPhase::Reconciling)?;
                let rows = remote_rows(session.queue(), &resp);
                let found = rows.iter().filter(|r| r.label.is_found()).count();
                if found < rows.len() {
                    tracing::warn!(
                        user_id = %user_id,
                        found,
                        total = rows.len(),
                        "Server omitted interval data for some words"
                    );
                }

                session.transition(SessionPhase::Cleaning)?;
                let cleanup = self.clean(&user_id, &batch);
                session.transition(SessionPhase::Reported)?;
                Ok(build_report(session, rows, SubmissionStatus::Sent, Some(cleanup)))
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, words = batch.len(), error = %e, "Training submission failed, results kept");
                session.transition(SessionPhase::FinishedWithError)?;
                let rows = session
                    .queue()
                    .iter()
                    .map(|w| row(w, ReviewLabel::NotFound))
                    .collect();
                let submission = SubmissionStatus::Failed {
                    reason: e.to_string(),
                    message: e.user_message(),
                };
                let cleanup = CacheCleanupStatus::NotCleared {
                    reason: "submission failed; results kept for resend".to_string(),
                };
                session.transition(SessionPhase::Reported)?;
                Ok(build_report(session, rows, submission, Some(cleanup)))
            }
        }
    }

    fn finish_local(&self, session: &mut TrainingSession) -> Result<FinalReport, DrillError> {
        let user_id = session.user_id.clone();
        let now = Utc::now();
        let mut rows = Vec::with_capacity(session.queue().len());

        for word in session.queue() {
            let correct = session
                .pending_results()
                .get(&word.word_id)
                .is_some_and(|o| o.is_correct());
            let label = match self.store.reschedule_vocabulary(&user_id, &word.word_id, correct, now) {
                Ok(Some(schedule)) => ReviewLabel::scheduled(bucket_minutes(schedule.interval_minutes())),
                Ok(None) => {
                    tracing::warn!(user_id = %user_id, word_id = %word.word_id, "Vocabulary word vanished before rescheduling");
                    ReviewLabel::NotFound
                }
                Err(e) => {
                    tracing::warn!(user_id = %user_id, word_id = %word.word_id, error = %e, "Failed to reschedule word");
                    ReviewLabel::NotFound
                }
            };
            rows.push(row(word, label));
        }

        session.transition(SessionPhase::Reported)?;
        tracing::info!(user_id = %user_id, words = rows.len(), "Local training scheduled");
        Ok(build_report(session, rows, SubmissionStatus::LocalOnly, None))
    }

    async fn submit(&self, user_id: &str, batch: &PendingResults) -> Result<SubmitResponse, DrillError> {
        let resp = self
            .provider
            .submit_batch(user_id, batch)
            .await
            .map_err(|e| match e {
                ProviderError::Auth(msg) => DrillError::Auth(msg),
                other => DrillError::Submission(other),
            })?;
        if !resp.is_ok() {
            let detail = if resp.error_msg.is_empty() {
                format!("status {:?}", resp.status)
            } else {
                resp.error_msg.clone()
            };
            return Err(DrillError::Submission(ProviderError::Rejected(detail)));
        }
        Ok(resp)
    }

    fn clean(&self, user_id: &str, submitted: &PendingResults) -> CacheCleanupStatus {
        match self.cache.clear_submitted(user_id, submitted) {
            Ok(true) => CacheCleanupStatus::ClearedHadData,
            Ok(false) => CacheCleanupStatus::ClearedWasEmpty,
            Err(e) => {
                tracing::error!(user_id, error = %e, "Failed to clear submitted results");
                CacheCleanupStatus::NotCleared {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Drops the in-memory session. The durable cache is left alone.
    pub async fn cancel_session(&self, user_id: &str) -> CancelOutcome {
        let Some(slot) = self.slot(user_id).await else {
            return CancelOutcome::NoSession;
        };
        let Ok(mut session) = slot.try_lock() else {
            return CancelOutcome::Busy;
        };
        let phase = session.phase();
        if !phase.is_cancellable() {
            return CancelOutcome::NotCancellable { phase };
        }
        if session.cancel().is_err() {
            return CancelOutcome::NotCancellable { phase };
        }
        let answered = session.pending_results().len();
        drop(session);
        self.remove_slot(user_id, &slot).await;
        tracing::info!(user_id, answered, "Training cancelled");
        CancelOutcome::Cancelled
    }

    pub async fn final_report(&self, user_id: &str) -> Result<FinalReport, DrillError> {
        self.reports
            .read()
            .await
            .get(user_id)
            .cloned()
            .ok_or(DrillError::ReportNotReady)
    }

    /// Sends whatever the durable cache holds for `user_id`. The user's slot
    /// is claimed for the whole round trip, so a second resend or a start
    /// arriving meanwhile gets [`DrillError::SessionAlreadyActive`].
    pub async fn resend_pending(&self, user_id: &str) -> Result<ResendOutcome, DrillError> {
        let mut session = TrainingSession::new(user_id, TrainingType::RemoteSynced);
        session.begin_resend()?;
        let slot: SessionSlot = Arc::new(Mutex::new(session));
        let guard = slot.lock().await;

        {
            let mut sessions = self.sessions.write().await;
            if sessions.contains_key(user_id) {
                tracing::info!(user_id, "Rejected resend, user slot busy");
                return Err(DrillError::SessionAlreadyActive);
            }
            sessions.insert(user_id.to_string(), slot.clone());
        }

        let resent = self.resend_claimed(user_id).await;
        drop(guard);
        self.remove_slot(user_id, &slot).await;
        resent
    }

    async fn resend_claimed(&self, user_id: &str) -> Result<ResendOutcome, DrillError> {
        let pending = self.cache.load(user_id)?;
        if pending.is_empty() {
            return Err(DrillError::NothingToResend);
        }

        let resp = self.submit(user_id, &pending).await.inspect_err(|e| {
            tracing::error!(user_id, words = pending.len(), error = %e, "Resend failed, results kept");
        })?;
        let cleanup = self.clean(user_id, &pending);
        tracing::info!(user_id, words = pending.len(), "Pending results resent");

        Ok(ResendOutcome {
            sent: pending.len(),
            intervals_returned: resp.words.len(),
            cleanup,
        })
    }

    pub fn cache_status(&self, user_id: &str) -> Result<CacheStatus, DrillError> {
        Ok(CacheStatus::of(&self.cache.load(user_id)?))
    }

    /// Pulls the provider dictionary into the local vocabulary. Existing
    /// words keep their schedule.
    pub async fn sync_vocabulary(&self, user_id: &str) -> Result<VocabularySync, DrillError> {
        let payload = self
            .provider
            .export_vocabulary(user_id)
            .await
            .map_err(DrillError::from_fetch)?;

        let items: Vec<(Option<String>, String, String)> = match payload {
            ProviderPayload::Dictionary(entries) => entries
                .into_iter()
                .map(|e| (e.id, e.word, e.translate))
                .collect(),
            ProviderPayload::Training(words) => words
                .into_iter()
                .map(|w| (w.word_id, w.word_value, w.correct_translate_value))
                .collect(),
            ProviderPayload::Rich(entries) => {
                tracing::warn!(user_id, entries = entries.len(), "Export returned no word texts");
                Vec::new()
            }
        };

        let now = Utc::now();
        let mut summary = VocabularySync::default();
        for (word_id, word, translation) in items {
            let Some(word_id) = word_id else { continue };
            if word.is_empty() || translation.is_empty() {
                continue;
            }
            let added = self.store.upsert_vocabulary(
                user_id,
                &word_id,
                &word,
                &translation,
                self.config.default_ease,
                now,
            )?;
            summary.total += 1;
            if added {
                summary.added += 1;
            } else {
                summary.updated += 1;
            }
        }

        tracing::info!(
            user_id,
            total = summary.total,
            added = summary.added,
            updated = summary.updated,
            "Vocabulary synced"
        );
        Ok(summary)
    }

    /// Adds a word to the provider dictionary. The local vocabulary picks it
    /// up on the next sync.
    pub async fn add_word(
        &self,
        user_id: &str,
        word: &str,
        translation: &str,
    ) -> Result<AddedWord, DrillError> {
        let word = word.trim();
        let translation = translation.trim();
        if word.is_empty() || translation.is_empty() {
            return Err(DrillError::InvalidWord(
                "word and translation are required".to_string(),
            ));
        }
        if word.chars().count() > MAX_WORD_CHARS || translation.chars().count() > MAX_WORD_CHARS {
            return Err(DrillError::InvalidWord(format!(
                "longer than {MAX_WORD_CHARS} characters"
            )));
        }

        let resp = self
            .provider
            .add_word(user_id, word, translation)
            .await
            .map_err(|e| match e {
                ProviderError::Auth(msg) => DrillError::Auth(msg),
                other => DrillError::AddWord(other),
            })?;
        if let Some(reason) = resp.rejection() {
            tracing::warn!(user_id, word, reason = %reason, "Provider rejected word");
            return Err(DrillError::AddWord(ProviderError::Rejected(reason)));
        }

        tracing::info!(user_id, word, "Word added to dictionary");
        Ok(AddedWord {
            word: word.to_string(),
            translation: translation.to_string(),
        })
    }

    pub fn due_count(&self, user_id: &str) -> Result<usize, DrillError> {
        Ok(self.store.count_due_vocabulary(user_id, Utc::now())?)
    }

    /// Cancels quizzing sessions with no event for `idle_for`.
    pub async fn cancel_idle_sessions(&self, idle_for: chrono::Duration) -> usize {
        let now = Utc::now();
        let candidates: Vec<String> = {
            let sessions = self.sessions.read().await;
            sessions
                .iter()
                .filter(|(_, slot)| {
                    slot.try_lock()
                        .map(|s| s.phase().is_cancellable() && s.idle_for(now) >= idle_for)
                        .unwrap_or(false)
                })
                .map(|(user, _)| user.clone())
                .collect()
        };

        let mut cancelled = 0;
        for user_id in candidates {
            if self.cancel_session(&user_id).await == CancelOutcome::Cancelled {
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Drops final reports that finished more than `max_age` ago.
    pub async fn expire_reports(&self, max_age: chrono::Duration) -> usize {
        let now = Utc::now();
        let mut reports = self.reports.write().await;
        let before = reports.len();
        reports.retain(|_, r| now.signed_duration_since(r.finished_at) < max_age);
        before - reports.len()
    }
}

fn row(word: &WordRecord, label: ReviewLabel) -> ReviewRow {
    ReviewRow {
        word_id: word.word_id.clone(),
        prompt: word.prompt.clone(),
        correct_value: word.correct_option_value.clone(),
        label,
    }
}

fn remote_rows(queue: &[WordRecord], resp: &SubmitResponse) -> Vec<ReviewRow> {
    queue
        .iter()
        .map(|word| {
            let label = match resp.interval_for(&word.word_id) {
                Some(data) => ReviewLabel::scheduled(label(
                    data.repeat_at.as_deref(),
                    Some(data.interval_minutes()),
                )),
                None => ReviewLabel::NotFound,
            };
            row(word, label)
        })
        .collect()
}

fn build_report(
    session: &TrainingSession,
    rows: Vec<ReviewRow>,
    submission: SubmissionStatus,
    cache_cleanup: Option<CacheCleanupStatus>,
) -> FinalReport {
    let tally = session.tally();
    let accuracy = tally.accuracy_percent();
    FinalReport {
        session_id: session.id,
        user_id: session.user_id.clone(),
        training_type: session.training_type,
        tally,
        accuracy_percent: accuracy,
        encouragement: Encouragement::for_accuracy(accuracy),
        mistakes: session.mistakes().to_vec(),
        intervals_found: rows.iter().filter(|r| r.label.is_found()).count(),
        rows,
        submission,
        cache_cleanup,
        finished_at: Utc::now(),
    }
}
