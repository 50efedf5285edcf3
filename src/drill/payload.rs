//! Vendor payload shapes, resolved once into a tagged union at ingestion.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::types::{de_lenient_i64, de_lenient_string, de_opaque_id, de_text};

/// Minutes assumed when the server omits `repeat_interval`.
pub const DEFAULT_REPEAT_INTERVAL_MINUTES: i64 = 480;

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("provider reported status {status}: {message}")]
    Status { status: String, message: String },

    #[error("unrecognised payload shape")]
    UnknownShape,
}

/// Distractor candidate carried by rich payloads.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TranslateCandidate {
    #[serde(default, deserialize_with = "de_opaque_id")]
    pub id: Option<String>,
    #[serde(default, alias = "translate_value", alias = "tr", deserialize_with = "de_text")]
    pub value: String,
}

/// One item of the training game list. Never carries repeat metadata.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrainingWord {
    #[serde(default, alias = "id", deserialize_with = "de_opaque_id")]
    pub word_id: Option<String>,
    #[serde(default, alias = "word", deserialize_with = "de_text")]
    pub word_value: String,
    #[serde(default, deserialize_with = "de_text")]
    pub correct_translate_value: String,
    #[serde(default, deserialize_with = "de_opaque_id")]
    pub translate_id: Option<String>,
    #[serde(default, deserialize_with = "de_progress")]
    pub progress_percent: u8,
    #[serde(default, deserialize_with = "de_lenient_vec")]
    pub translates: Vec<TranslateCandidate>,
}

/// One item of the dictionary export.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DictionaryEntry {
    #[serde(default, alias = "word_id", deserialize_with = "de_opaque_id")]
    pub id: Option<String>,
    #[serde(default, alias = "wd", alias = "word_value", deserialize_with = "de_text")]
    pub word: String,
    #[serde(default, alias = "trc", alias = "correct_translate_value", deserialize_with = "de_text")]
    pub translate: String,
    #[serde(default, deserialize_with = "de_opaque_id")]
    pub translate_id: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_string")]
    pub repeat_at: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub repeat_interval: Option<i64>,
}

/// One item of the richer payload with real distractors.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RichEntry {
    #[serde(default, alias = "id", deserialize_with = "de_opaque_id")]
    pub word_id: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_vec")]
    pub translates: Vec<TranslateCandidate>,
    #[serde(default, deserialize_with = "de_lenient_string")]
    pub repeat_at: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub repeat_interval: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderPayload {
    Training(Vec<TrainingWord>),
    Dictionary(Vec<DictionaryEntry>),
    Rich(Vec<RichEntry>),
}

impl ProviderPayload {
    /// Classifies a raw vendor response.
    ///
    /// Individual malformed items are skipped with a warning; only a non-ok
    /// status or an unrecognisable envelope is an error.
    pub fn from_json(raw: Value) -> Result<Self, PayloadError> {
        match raw {
            Value::Array(items) => Ok(Self::classify_list(items)),
            Value::Object(mut obj) => {
                if let Some(status) = obj.get("status").and_then(Value::as_str) {
                    if status != "ok" {
                        let message = obj
                            .get("error_msg")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        return Err(PayloadError::Status {
                            status: status.to_string(),
                            message,
                        });
                    }
                }

                if let Some(game) = obj.remove("game") {
                    let items = match game {
                        Value::Object(mut g) => match g.remove("user_words") {
                            Some(Value::Array(items)) => items,
                            _ => Vec::new(),
                        },
                        _ => Vec::new(),
                    };
                    return Ok(Self::Training(parse_items(items, "training")));
                }

                for field in ["data", "words"] {
                    if let Some(Value::Array(items)) = obj.remove(field) {
                        return Ok(Self::classify_list(items));
                    }
                }

                Err(PayloadError::UnknownShape)
            }
            _ => Err(PayloadError::UnknownShape),
        }
    }

    fn classify_list(items: Vec<Value>) -> Self {
        let rich = items
            .iter()
            .any(|item| matches!(item.get("translates"), Some(Value::Array(_))));
        if rich {
            Self::Rich(parse_items(items, "rich"))
        } else {
            Self::Dictionary(parse_items(items, "dictionary"))
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Training(v) => v.len(),
            Self::Dictionary(v) => v.len(),
            Self::Rich(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_items<T: DeserializeOwned>(items: Vec<Value>, kind: &'static str) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(idx, item)| match serde_json::from_value::<T>(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!(kind, index = idx, error = %e, "Skipping malformed payload item");
                None
            }
        })
        .collect()
}

fn de_lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn de_progress<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = de_lenient_i64(deserializer)?;
    Ok(raw.unwrap_or(0).clamp(0, 100) as u8)
}

/// Per-word interval data returned by the repetition endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerWordInterval {
    #[serde(default, alias = "id", deserialize_with = "de_opaque_id")]
    pub word_id: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_string")]
    pub repeat_at: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub repeat_interval: Option<i64>,
}

impl ServerWordInterval {
    pub fn interval_minutes(&self) -> i64 {
        self.repeat_interval.unwrap_or(DEFAULT_REPEAT_INTERVAL_MINUTES)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SubmitResponse {
    #[serde(default, deserialize_with = "de_text")]
    pub status: String,
    #[serde(default, deserialize_with = "de_text")]
    pub error_msg: String,
    #[serde(default, deserialize_with = "de_lenient_vec")]
    pub words: Vec<ServerWordInterval>,
}

impl SubmitResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    pub fn interval_for(&self, word_id: &str) -> Option<&ServerWordInterval> {
        self.words
            .iter()
            .find(|w| w.word_id.as_deref() == Some(word_id))
    }
}

/// Answer to a dictionary add. The vendor often omits `status` on success,
/// so only an explicit error marks a rejection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AddWordResponse {
    #[serde(default, deserialize_with = "de_text")]
    pub status: String,
    #[serde(default, deserialize_with = "de_text")]
    pub error_msg: String,
}

impl AddWordResponse {
    pub fn rejection(&self) -> Option<String> {
        if !self.error_msg.is_empty() {
            return Some(self.error_msg.clone());
        }
        if !self.status.is_empty() && self.status != "ok" {
            return Some(format!("status {:?}", self.status));
        }
        None
    }
}
