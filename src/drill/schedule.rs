use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_EASE_FACTOR: f64 = 1.3;
pub const EASE_PENALTY: f64 = 0.2;
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
pub const RELEARN_INTERVAL_HOURS: f64 = 12.0;

/// Local spaced-repetition state for one vocabulary word.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSchedule {
    pub repetitions: u32,
    pub ease_factor: f64,
    pub interval_hours: f64,
    pub next_review_at: DateTime<Utc>,
}

impl ReviewSchedule {
    /// Schedule for a word that has never been reviewed; due immediately.
    pub fn new_word(ease_factor: f64, now: DateTime<Utc>) -> Self {
        Self {
            repetitions: 0,
            ease_factor: ease_factor.max(MIN_EASE_FACTOR),
            interval_hours: RELEARN_INTERVAL_HOURS,
            next_review_at: now,
        }
    }

    /// Applies one review outcome.
    ///
    /// A correct answer grows the interval linearly with the repetition count
    /// and leaves the ease factor alone. An incorrect answer resets the
    /// repetitions and lowers the ease, never below [`MIN_EASE_FACTOR`].
    pub fn update(&self, correct: bool, now: DateTime<Utc>) -> Self {
        let ease = self.ease_factor.max(MIN_EASE_FACTOR);
        let (repetitions, ease_factor, interval_hours) = if correct {
            let reps = self.repetitions.saturating_add(1);
            (reps, ease, f64::from(reps) * ease)
        } else {
            (0, (ease - EASE_PENALTY).max(MIN_EASE_FACTOR), RELEARN_INTERVAL_HOURS)
        };

        Self {
            repetitions,
            ease_factor,
            interval_hours,
            next_review_at: now + hours_to_duration(interval_hours),
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_at <= now
    }

    pub fn interval_minutes(&self) -> i64 {
        (self.interval_hours * 60.0).round() as i64
    }
}

fn hours_to_duration(hours: f64) -> Duration {
    Duration::milliseconds((hours * 3_600_000.0).round() as i64)
}
