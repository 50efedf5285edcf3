use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::{json, Value};

use lingua_drill::drill::payload::{AddWordResponse, ProviderPayload, SubmitResponse};
use lingua_drill::drill::types::PresentedWord;
use lingua_drill::drill::{OutcomeCode, PendingResults, ProviderError, ResultCache, WordProvider};
use lingua_drill::store::{Store, StoreError};

/// `(word_id, word, translate_id, translation)`
pub type WordSpec = (&'static str, &'static str, &'static str, &'static str);

pub const THREE_WORDS: [WordSpec; 3] = [
    ("101", "cat", "9101", "кот"),
    ("102", "dog", "9102", "собака"),
    ("103", "house", "9103", "дом"),
];

pub fn training_json(words: &[WordSpec]) -> Value {
    let user_words: Vec<Value> = words
        .iter()
        .map(|(id, word, tid, tr)| {
            json!({
                "word_id": id.parse::<u64>().unwrap_or_default(),
                "word_value": word,
                "translate_id": tid,
                "correct_translate_value": tr,
                "progress_percent": 25,
            })
        })
        .collect();
    json!({"status": "ok", "game": {"user_words": user_words}})
}

pub fn dictionary_json(words: &[WordSpec]) -> Value {
    let data: Vec<Value> = words
        .iter()
        .map(|(id, word, tid, tr)| {
            json!({"id": id, "wd": word, "trc": tr, "translate_id": tid})
        })
        .collect();
    json!({"data": data})
}

pub fn training_payload(words: &[WordSpec]) -> ProviderPayload {
    ProviderPayload::from_json(training_json(words)).expect("training payload")
}

pub fn dictionary_payload(words: &[WordSpec]) -> ProviderPayload {
    ProviderPayload::from_json(dictionary_json(words)).expect("dictionary payload")
}

/// Intervals echoed for every submitted word: 4320 minutes, no absolute date.
pub fn ok_response_for(batch: &PendingResults) -> Value {
    let words: Vec<Value> = batch
        .keys()
        .map(|id| json!({"word_id": id, "repeat_at": "0000-00-00 00:00:00", "repeat_interval": 4320}))
        .collect();
    json!({"status": "ok", "words": words})
}

pub fn correct_option_for(word: &PresentedWord, words: &[WordSpec]) -> String {
    let (_, _, tid, _) = words
        .iter()
        .find(|(id, ..)| *id == word.word_id)
        .expect("presented word is part of the fixture");
    tid.to_string()
}

pub fn wrong_option_for(word: &PresentedWord, words: &[WordSpec]) -> String {
    let correct = correct_option_for(word, words);
    word.options
        .iter()
        .find(|o| o.option_id != correct)
        .map(|o| o.option_id.clone())
        .expect("fixture words always offer a distractor")
}

/// How the scripted provider answers submits and dictionary adds.
#[derive(Debug, Clone)]
pub enum SubmitMode {
    /// Echo intervals for every submitted word; plain ok for adds.
    Accept,
    /// Answer with this body regardless of the batch.
    Body(Value),
    Network,
    Auth,
}

/// In-memory provider driven by the test.
pub struct ScriptedProvider {
    fetches: Mutex<VecDeque<Result<Vec<ProviderPayload>, ProviderError>>>,
    export: Mutex<Option<ProviderPayload>>,
    submit_mode: Mutex<SubmitMode>,
    submit_delay: Mutex<Option<Duration>>,
    submitted: Mutex<Vec<PendingResults>>,
    add_mode: Mutex<SubmitMode>,
    added: Mutex<Vec<(String, String)>>,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fetches: Mutex::new(VecDeque::new()),
            export: Mutex::new(None),
            submit_mode: Mutex::new(SubmitMode::Accept),
            submit_delay: Mutex::new(None),
            submitted: Mutex::new(Vec::new()),
            add_mode: Mutex::new(SubmitMode::Accept),
            added: Mutex::new(Vec::new()),
        })
    }

    pub fn push_fetch(&self, payloads: Vec<ProviderPayload>) {
        self.fetches.lock().unwrap().push_back(Ok(payloads));
    }

    pub fn push_fetch_error(&self, err: ProviderError) {
        self.fetches.lock().unwrap().push_back(Err(err));
    }

    pub fn set_export(&self, payload: ProviderPayload) {
        *self.export.lock().unwrap() = Some(payload);
    }

    pub fn set_submit_mode(&self, mode: SubmitMode) {
        *self.submit_mode.lock().unwrap() = mode;
    }

    /// Holds every submit for `delay` before answering.
    pub fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.lock().unwrap() = Some(delay);
    }

    pub fn submitted(&self) -> Vec<PendingResults> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn set_add_mode(&self, mode: SubmitMode) {
        *self.add_mode.lock().unwrap() = mode;
    }

    pub fn added(&self) -> Vec<(String, String)> {
        self.added.lock().unwrap().clone()
    }
}

impl WordProvider for ScriptedProvider {
    fn fetch_words<'a>(
        &'a self,
        _user_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ProviderPayload>, ProviderError>> {
        let next = self
            .fetches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()));
        Box::pin(async move { next })
    }

    fn export_vocabulary<'a>(
        &'a self,
        _user_id: &'a str,
    ) -> BoxFuture<'a, Result<ProviderPayload, ProviderError>> {
        let export = self.export.lock().unwrap().clone();
        Box::pin(async move {
            export.ok_or_else(|| ProviderError::Network("export not scripted".into()))
        })
    }

    fn submit_batch<'a>(
        &'a self,
        _user_id: &'a str,
        results: &'a PendingResults,
    ) -> BoxFuture<'a, Result<SubmitResponse, ProviderError>> {
        let mode = self.submit_mode.lock().unwrap().clone();
        let delay = *self.submit_delay.lock().unwrap();
        self.submitted.lock().unwrap().push(results.clone());
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let body = match mode {
                SubmitMode::Accept => ok_response_for(results),
                SubmitMode::Body(body) => body,
                SubmitMode::Network => return Err(ProviderError::Network("connection reset".into())),
                SubmitMode::Auth => return Err(ProviderError::Auth("session expired".into())),
            };
            serde_json::from_value(body).map_err(|e| ProviderError::Malformed(e.to_string()))
        })
    }

    fn add_word<'a>(
        &'a self,
        _user_id: &'a str,
        word: &'a str,
        translation: &'a str,
    ) -> BoxFuture<'a, Result<AddWordResponse, ProviderError>> {
        let mode = self.add_mode.lock().unwrap().clone();
        self.added
            .lock()
            .unwrap()
            .push((word.to_string(), translation.to_string()));
        Box::pin(async move {
            let body = match mode {
                SubmitMode::Accept => json!({"status": "ok"}),
                SubmitMode::Body(body) => body,
                SubmitMode::Network => return Err(ProviderError::Network("connection reset".into())),
                SubmitMode::Auth => return Err(ProviderError::Auth("session expired".into())),
            };
            serde_json::from_value(body).map_err(|e| ProviderError::Malformed(e.to_string()))
        })
    }
}

/// Store-backed cache whose cleanup always fails.
pub struct StuckCache {
    pub store: Arc<Store>,
}

impl ResultCache for StuckCache {
    fn load(&self, user_id: &str) -> Result<PendingResults, StoreError> {
        self.store.load(user_id)
    }

    fn persist_outcome(
        &self,
        user_id: &str,
        word_id: &str,
        outcome: OutcomeCode,
    ) -> Result<(), StoreError> {
        self.store.persist_outcome(user_id, word_id, outcome)
    }

    fn clear_submitted(
        &self,
        _user_id: &str,
        _submitted: &PendingResults,
    ) -> Result<bool, StoreError> {
        Err(StoreError::CasRetryExhausted {
            entity: "pending_results".into(),
            key: "stuck".into(),
            attempts: 20,
        })
    }

    fn pending_users(&self) -> Result<Vec<(String, usize)>, StoreError> {
        self.store.pending_users()
    }
}
