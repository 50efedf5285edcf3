//! reqwest client for the vendor training API.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{json, Value};

use super::payload::{AddWordResponse, ProviderPayload, SubmitResponse};
use super::provider::{CredentialSource, ProviderError, WordProvider};
use super::types::PendingResults;
use crate::config::ProviderConfig;

const API_VERSION: &str = "1.0.1";
const FETCH_TRAINING: &str = "word_get_repetition";
const SUBMIT_TRAINING: &str = "word_set_repetition";

/// Extracts the vendor user marker from a raw cookie header.
pub fn vendor_marker(cookies: &str) -> Option<String> {
    let mut fallback = None;
    for pair in cookies.split(';') {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match name.trim() {
            "_ym_uid" => return Some(value.to_string()),
            "lingualeouid" => fallback = Some(value.to_string()),
            _ => {}
        }
    }
    fallback
}

pub struct RemoteProvider {
    config: ProviderConfig,
    client: reqwest::Client,
    credentials: Arc<dyn CredentialSource>,
}

impl RemoteProvider {
    pub fn new(config: &ProviderConfig, credentials: Arc<dyn CredentialSource>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config: config.clone(),
            client,
            credentials,
        }
    }

    fn session_for(&self, user_id: &str) -> Result<(String, String), ProviderError> {
        let cookies = self
            .credentials
            .credential(user_id)?
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::Auth("no stored cookies".to_string()))?;
        let marker = vendor_marker(&cookies)
            .ok_or_else(|| ProviderError::Auth("cookies carry no user marker".to_string()))?;
        Ok((cookies, marker))
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.config.api_url.trim_end_matches('/'), endpoint)
    }

    async fn post(&self, endpoint: &str, cookies: &str, body: &Value) -> Result<Value, ProviderError> {
        let resp = self
            .client
            .post(self.url(endpoint))
            .header(reqwest::header::COOKIE, cookies)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::Auth(format!("vendor answered {status}")));
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }
        Ok(resp.json::<Value>().await?)
    }

    async fn fetch_training(&self, cookies: &str, marker: &str) -> Result<ProviderPayload, ProviderError> {
        let body = json!({
            "api_call": "process_training",
            "apiVersion": API_VERSION,
            "trainingName": FETCH_TRAINING,
            "data": {"wordSetId": self.config.dictionary_word_set_id, "limit": self.config.fetch_limit},
            "iDs": [{"y": marker}],
        });
        let raw = self.post("ProcessTraining", cookies, &body).await?;
        Ok(ProviderPayload::from_json(raw)?)
    }

    async fn fetch_export(&self, cookies: &str, marker: &str) -> Result<ProviderPayload, ProviderError> {
        let body = json!({
            "apiVersion": API_VERSION,
            "op": "loadCompactWords",
            "data": [{
                "action": "update",
                "mode": "compact",
                "wordSetId": self.config.dictionary_word_set_id,
                "wordIds": null,
                "dateGroups": ["all"],
            }],
            "iDs": [{"y": marker}],
        });
        let raw = self.post("SetWords", cookies, &body).await?;
        Ok(ProviderPayload::from_json(raw)?)
    }
}

impl WordProvider for RemoteProvider {
    fn fetch_words<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ProviderPayload>, ProviderError>> {
        Box::pin(async move {
            let (cookies, marker) = self.session_for(user_id)?;
            let training = self.fetch_training(&cookies, &marker).await?;
            let mut payloads = vec![training];

            // Training items never carry repeat metadata; the export does.
            match self.fetch_export(&cookies, &marker).await {
                Ok(export) => payloads.push(export),
                Err(e) => {
                    tracing::warn!(user_id, error = %e, "Export fetch failed, continuing without repeat metadata");
                }
            }
            Ok(payloads)
        })
    }

    fn export_vocabulary<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<ProviderPayload, ProviderError>> {
        Box::pin(async move {
            let (cookies, marker) = self.session_for(user_id)?;
            self.fetch_export(&cookies, &marker).await
        })
    }

    fn submit_batch<'a>(
        &'a self,
        user_id: &'a str,
        results: &'a PendingResults,
    ) -> BoxFuture<'a, Result<SubmitResponse, ProviderError>> {
        Box::pin(async move {
            let (cookies, marker) = self.session_for(user_id)?;
            let body = json!({
                "api_call": "process_training",
                "apiVersion": API_VERSION,
                "trainingName": SUBMIT_TRAINING,
                "data": {"words": results, "wordSetId": self.config.word_set_id},
                "iDs": [{"y": marker}],
            });
            let raw = self.post("ProcessTraining", &cookies, &body).await?;
            serde_json::from_value::<SubmitResponse>(raw)
                .map_err(|e| ProviderError::Malformed(e.to_string()))
        })
    }

    fn add_word<'a>(
        &'a self,
        user_id: &'a str,
        word: &'a str,
        translation: &'a str,
    ) -> BoxFuture<'a, Result<AddWordResponse, ProviderError>> {
        Box::pin(async move {
            let (cookies, marker) = self.session_for(user_id)?;
            let body = add_word_body(word, translation, self.config.dictionary_word_set_id, &marker);
            let raw = self.post("SetWords", &cookies, &body).await?;
            serde_json::from_value::<AddWordResponse>(raw)
                .map_err(|e| ProviderError::Malformed(e.to_string()))
        })
    }
}

fn add_word_body(word: &str, translation: &str, word_set_id: u32, marker: &str) -> Value {
    json!({
        "apiVersion": API_VERSION,
        "op": "actionWithWords {action: add}",
        "data": [{
            "action": "add",
            "mode": "0",
            "wordIds": null,
            "valueList": {
                "wordSetId": word_set_id,
                "wordValue": word,
                "translation": {"id": 0, "tr": translation, "main": 1, "selected": 1},
            },
        }],
        "userData": {"nativeLanguage": "lang_id_src"},
        "iDs": [{"y": marker}],
    })
}
