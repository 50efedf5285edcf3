//! Per-user quiz state machine. Pure: no I/O, callers persist between steps.

use std::fmt;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use super::error::DrillError;
use super::types::{
    AnswerOption, MistakeRecord, OutcomeCode, PendingResults, PresentedWord, Tally, TrainingType,
    WordRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    Idle,
    Loading,
    Presenting,
    Scoring,
    Finished,
    Submitting,
    FinishedWithError,
    Reconciling,
    Cleaning,
    Reported,
    Cancelled,
}

impl SessionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Presenting => "presenting",
            Self::Scoring => "scoring",
            Self::Finished => "finished",
            Self::Submitting => "submitting",
            Self::FinishedWithError => "finished_with_error",
            Self::Reconciling => "reconciling",
            Self::Cleaning => "cleaning",
            Self::Reported => "reported",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Reported | Self::Cancelled)
    }

    pub fn is_cancellable(self) -> bool {
        matches!(self, Self::Presenting | Self::Scoring)
    }

    fn can_transition_to(self, next: SessionPhase) -> bool {
        use SessionPhase::*;
        matches!(
            (self, next),
            (Idle, Loading)
                | (Idle, Submitting)
                | (Loading, Presenting)
                | (Loading, Idle)
                | (Presenting, Scoring)
                | (Presenting, Cancelled)
                | (Scoring, Presenting)
                | (Scoring, Finished)
                | (Scoring, Cancelled)
                | (Finished, Submitting)
                | (Finished, Reported)
                | (Submitting, Reconciling)
                | (Submitting, FinishedWithError)
                | (Reconciling, Cleaning)
                | (Cleaning, Reported)
                | (FinishedWithError, Reported)
        )
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of validating an answer against the current word.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredAnswer {
    pub word_index: usize,
    pub word_id: String,
    pub outcome: OutcomeCode,
    pub chosen: AnswerOption,
}

impl ScoredAnswer {
    pub fn correct(&self) -> bool {
        self.outcome.is_correct()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    Next,
    Finished,
}

#[derive(Debug, Clone)]
pub struct TrainingSession {
    pub id: Uuid,
    pub user_id: String,
    pub training_type: TrainingType,
    queue: Vec<WordRecord>,
    cursor: usize,
    phase: SessionPhase,
    tally: Tally,
    mistakes: Vec<MistakeRecord>,
    pending_results: PendingResults,
    presented: Vec<AnswerOption>,
    pub started_at: DateTime<Utc>,
    pub last_event_at: DateTime<Utc>,
}

impl TrainingSession {
    pub fn new(user_id: impl Into<String>, training_type: TrainingType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            training_type,
            queue: Vec::new(),
            cursor: 0,
            phase: SessionPhase::Idle,
            tally: Tally::default(),
            mistakes: Vec::new(),
            pending_results: PendingResults::new(),
            presented: Vec::new(),
            started_at: now,
            last_event_at: now,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn queue(&self) -> &[WordRecord] {
        &self.queue
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn tally(&self) -> Tally {
        self.tally
    }

    pub fn mistakes(&self) -> &[MistakeRecord] {
        &self.mistakes
    }

    pub fn pending_results(&self) -> &PendingResults {
        &self.pending_results
    }

    pub fn current_word(&self) -> Option<&WordRecord> {
        self.queue.get(self.cursor)
    }

    /// Moves to `next`, rejecting edges the lifecycle does not allow.
    pub fn transition(&mut self, next: SessionPhase) -> Result<(), DrillError> {
        if !self.phase.can_transition_to(next) {
            return Err(DrillError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::debug!(
            user_id = %self.user_id,
            session_id = %self.id,
            from = %self.phase,
            to = %next,
            "Session phase transition"
        );
        self.phase = next;
        self.last_event_at = Utc::now();
        Ok(())
    }

    pub fn begin_loading(&mut self) -> Result<(), DrillError> {
        self.transition(SessionPhase::Loading)
    }

    /// Marks a session that only carries a resend of cached outcomes. It
    /// holds the user's slot and never presents a word.
    pub fn begin_resend(&mut self) -> Result<(), DrillError> {
        self.transition(SessionPhase::Submitting)
    }

    /// Installs the reconciled queue. An empty queue sends the session back
    /// to `Idle` with [`DrillError::EmptyWords`].
    pub fn load(&mut self, queue: Vec<WordRecord>) -> Result<(), DrillError> {
        if queue.is_empty() {
            self.transition(SessionPhase::Idle)?;
            return Err(DrillError::EmptyWords);
        }
        self.queue = queue;
        self.cursor = 0;
        self.transition(SessionPhase::Presenting)
    }

    /// Shuffles the current word's options for display and remembers the
    /// presented set so answers can be matched by option id.
    pub fn present<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<PresentedWord> {
        if self.phase != SessionPhase::Presenting {
            return None;
        }
        let word = self.queue.get(self.cursor)?;
        let mut options = word.options.clone();
        options.shuffle(rng);
        self.presented = options.clone();
        Some(PresentedWord {
            word_index: self.cursor,
            total: self.queue.len(),
            word_id: word.word_id.clone(),
            prompt: word.prompt.clone(),
            options,
        })
    }

    /// Validates an answer event without mutating the session.
    pub fn check_answer(
        &self,
        word_index: usize,
        selected_option_id: &str,
    ) -> Result<ScoredAnswer, DrillError> {
        if self.phase != SessionPhase::Presenting {
            return Err(DrillError::NotAcceptingAnswers(self.phase));
        }
        if word_index != self.cursor {
            return Err(DrillError::StaleAnswer {
                expected: self.cursor,
                got: word_index,
            });
        }
        let word = self
            .queue
            .get(self.cursor)
            .ok_or(DrillError::NotAcceptingAnswers(self.phase))?;

        let chosen = self
            .presented
            .iter()
            .chain(word.options.iter())
            .find(|o| o.option_id == selected_option_id)
            .cloned()
            .ok_or_else(|| DrillError::UnknownOption(selected_option_id.to_string()))?;

        Ok(ScoredAnswer {
            word_index,
            word_id: word.word_id.clone(),
            outcome: OutcomeCode::from_correct(word.is_correct(&chosen.option_id)),
            chosen,
        })
    }

    /// Records a scored answer. The caller must have made the outcome
    /// durable before calling this.
    pub fn apply(&mut self, scored: &ScoredAnswer) -> Result<(), DrillError> {
        self.transition(SessionPhase::Scoring)?;
        self.pending_results
            .insert(scored.word_id.clone(), scored.outcome);
        self.tally.record(scored.correct());

        if !scored.correct() {
            if let Some(word) = self.queue.get(scored.word_index) {
                self.mistakes.push(MistakeRecord {
                    word_id: word.word_id.clone(),
                    word: word.prompt.clone(),
                    correct_value: word.correct_option_value.clone(),
                    chosen_value: scored.chosen.value.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn advance(&mut self) -> Result<Advance, DrillError> {
        if self.cursor + 1 < self.queue.len() {
            self.cursor += 1;
            self.transition(SessionPhase::Presenting)?;
            Ok(Advance::Next)
        } else {
            self.cursor = self.queue.len();
            self.presented.clear();
            self.transition(SessionPhase::Finished)?;
            Ok(Advance::Finished)
        }
    }

    pub fn cancel(&mut self) -> Result<(), DrillError> {
        self.transition(SessionPhase::Cancelled)?;
        self.presented.clear();
        Ok(())
    }

    pub fn idle_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_event_at
    }
}
