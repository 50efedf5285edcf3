use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Outcome of a single answered word, keyed by word id in the pending map.
pub type PendingResults = BTreeMap<String, OutcomeCode>;

/// Maximum number of answer options presented for one word.
pub const MAX_OPTIONS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOption {
    pub option_id: String,
    pub value: String,
}

impl AnswerOption {
    pub fn new(option_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            option_id: option_id.into(),
            value: value.into(),
        }
    }
}

/// Canonical quiz item after reconciliation.
///
/// `options` always contains the option identified by `correct_option_id`.
/// Options are identified by id; their position changes on every presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordRecord {
    pub word_id: String,
    pub prompt: String,
    pub correct_option_id: String,
    pub correct_option_value: String,
    pub options: Vec<AnswerOption>,
    pub progress_percent: u8,
    pub remote_repeat_at: Option<String>,
    pub remote_repeat_interval_minutes: Option<i64>,
}

impl WordRecord {
    pub fn option(&self, option_id: &str) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.option_id == option_id)
    }

    pub fn is_correct(&self, option_id: &str) -> bool {
        self.correct_option_id == option_id
    }
}

/// Wire codes understood by the remote repetition endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum OutcomeCode {
    Correct,
    Incorrect,
}

impl OutcomeCode {
    pub fn from_correct(correct: bool) -> Self {
        if correct {
            Self::Correct
        } else {
            Self::Incorrect
        }
    }

    pub fn is_correct(self) -> bool {
        matches!(self, Self::Correct)
    }
}

impl From<OutcomeCode> for u8 {
    fn from(code: OutcomeCode) -> Self {
        match code {
            OutcomeCode::Correct => 1,
            OutcomeCode::Incorrect => 2,
        }
    }
}

impl TryFrom<u8> for OutcomeCode {
    type Error = String;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(Self::Correct),
            2 => Ok(Self::Incorrect),
            other => Err(format!("unknown outcome code {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrainingType {
    /// Word -> translation, results are submitted to the provider.
    RemoteSynced,
    /// Translation -> word from the local vocabulary, scheduled locally.
    LocalOnly,
}

impl TrainingType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RemoteSynced => "remote_synced",
            Self::LocalOnly => "local_only",
        }
    }
}

impl fmt::Display for TrainingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub correct: u32,
    pub total: u32,
}

impl Tally {
    pub fn record(&mut self, correct: bool) {
        self.total += 1;
        if correct {
            self.correct += 1;
        }
    }

    pub fn incorrect(&self) -> u32 {
        self.total - self.correct
    }

    pub fn accuracy_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        f64::from(self.correct) / f64::from(self.total) * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MistakeRecord {
    pub word_id: String,
    pub word: String,
    pub correct_value: String,
    pub chosen_value: String,
}

/// One word as shown to the learner, options in presentation order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentedWord {
    pub word_index: usize,
    pub total: usize,
    pub word_id: String,
    pub prompt: String,
    pub options: Vec<AnswerOption>,
}

/// Coerces a JSON string or number into the canonical id string.
///
/// Integral floats (`123.0`) collapse to `"123"` so that ids sent as numbers
/// and ids sent as strings compare equal.
pub fn normalize_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                n.as_f64().map(|f| {
                    if f.fract() == 0.0 && f.abs() < 9.0e15 {
                        format!("{}", f as i64)
                    } else {
                        f.to_string()
                    }
                })
            }
        }
        _ => None,
    }
}

pub(crate) fn de_opaque_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(normalize_id))
}

pub(crate) fn de_lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    })
}

pub(crate) fn de_lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

pub(crate) fn de_lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

pub(crate) fn de_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_lenient_string(deserializer)?.unwrap_or_default())
}
