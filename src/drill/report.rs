use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::interval::DisplayLabel;
use super::types::{MistakeRecord, Tally, TrainingType};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum CacheCleanupStatus {
    ClearedHadData,
    ClearedWasEmpty,
    NotCleared { reason: String },
}

impl CacheCleanupStatus {
    pub fn describe(&self) -> String {
        match self {
            Self::ClearedHadData => "Cache cleared (it held unsent results).".to_string(),
            Self::ClearedWasEmpty => "Cache cleared (it was already empty).".to_string(),
            Self::NotCleared { reason } => format!("Cache NOT cleared: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum SubmissionStatus {
    Sent,
    Failed { reason: String, message: String },
    LocalOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ReviewLabel {
    Scheduled { label: DisplayLabel, text: String },
    NotFound,
}

impl ReviewLabel {
    pub fn scheduled(label: DisplayLabel) -> Self {
        Self::Scheduled {
            text: label.to_string(),
            label,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Scheduled { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRow {
    pub word_id: String,
    pub prompt: String,
    pub correct_value: String,
    pub label: ReviewLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Encouragement {
    Excellent,
    Good,
    Repeat,
}

impl Encouragement {
    pub fn for_accuracy(accuracy: f64) -> Self {
        if accuracy >= 80.0 {
            Self::Excellent
        } else if accuracy >= 60.0 {
            Self::Good
        } else {
            Self::Repeat
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent result!",
            Self::Good => "Well done! Keep training!",
            Self::Repeat => "Recommended to repeat the difficult words.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalReport {
    pub session_id: Uuid,
    pub user_id: String,
    pub training_type: TrainingType,
    pub tally: Tally,
    pub accuracy_percent: f64,
    pub encouragement: Encouragement,
    pub mistakes: Vec<MistakeRecord>,
    pub rows: Vec<ReviewRow>,
    pub intervals_found: usize,
    pub submission: SubmissionStatus,
    pub cache_cleanup: Option<CacheCleanupStatus>,
    pub finished_at: DateTime<Utc>,
}

impl FinalReport {
    /// Plain-text summary for the chat transport.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Training finished");
        let _ = writeln!(
            out,
            "Correct: {} of {} ({:.0}%)",
            self.tally.correct, self.tally.total, self.accuracy_percent
        );

        if !self.mistakes.is_empty() {
            let _ = writeln!(out, "\nMistakes:");
            for m in &self.mistakes {
                let _ = writeln!(out, "- {} — {} (you chose {})", m.word, m.correct_value, m.chosen_value);
            }
        }
        let _ = writeln!(out, "\n{}", self.encouragement.text());

        match &self.submission {
            SubmissionStatus::Sent => {}
            SubmissionStatus::LocalOnly => {
                let _ = writeln!(out, "\nResults saved to the local schedule.");
            }
            SubmissionStatus::Failed { message, .. } => {
                let _ = writeln!(out, "\n{message}");
            }
        }

        if let Some(cleanup) = &self.cache_cleanup {
            let _ = writeln!(out, "\n{}", cleanup.describe());
        }

        if self.intervals_found > 0 || matches!(self.submission, SubmissionStatus::Sent) {
            let _ = writeln!(out, "\nReview intervals:");
            for row in &self.rows {
                let label = match &row.label {
                    ReviewLabel::Scheduled { text, .. } => text.as_str(),
                    ReviewLabel::NotFound => "not found",
                };
                let _ = writeln!(out, "- {} — {}: {}", row.prompt, row.correct_value, label);
            }
            let _ = writeln!(
                out,
                "Words with intervals found: {} of {}",
                self.intervals_found,
                self.rows.len()
            );
        } else {
            let _ = writeln!(out, "\nCould not get review intervals.");
        }
        out
    }
}
