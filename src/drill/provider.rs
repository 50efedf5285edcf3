//! Seams to the vendor API and to the credential collaborator.

use futures::future::BoxFuture;
use thiserror::Error;

use super::payload::{AddWordResponse, PayloadError, ProviderPayload, SubmitResponse};
use super::types::PendingResults;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// No usable vendor session, however many fallbacks were tried.
    #[error("no valid provider credential: {0}")]
    Auth(String),

    #[error("provider request failed: {0}")]
    Network(String),

    #[error("provider returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),

    /// HTTP succeeded but the body status was not "ok".
    #[error("provider rejected the batch: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<PayloadError> for ProviderError {
    fn from(e: PayloadError) -> Self {
        match e {
            PayloadError::Status { ref message, .. } if looks_like_auth(message) => {
                Self::Auth(message.clone())
            }
            other => Self::Malformed(other.to_string()),
        }
    }
}

impl From<StoreError> for ProviderError {
    fn from(e: StoreError) -> Self {
        Self::Network(format!("credential lookup failed: {e}"))
    }
}

fn looks_like_auth(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("auth") || lower.contains("login") || lower.contains("session")
}

/// Remote source of words and sink of training outcomes.
pub trait WordProvider: Send + Sync {
    /// Words for one training run; may return several payload shapes.
    fn fetch_words<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ProviderPayload>, ProviderError>>;

    /// The user's whole dictionary, used for local vocabulary sync.
    fn export_vocabulary<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<ProviderPayload, ProviderError>>;

    fn submit_batch<'a>(
        &'a self,
        user_id: &'a str,
        results: &'a PendingResults,
    ) -> BoxFuture<'a, Result<SubmitResponse, ProviderError>>;

    /// Adds one word with a chosen translation to the user's dictionary.
    fn add_word<'a>(
        &'a self,
        user_id: &'a str,
        word: &'a str,
        translation: &'a str,
    ) -> BoxFuture<'a, Result<AddWordResponse, ProviderError>>;
}

/// Supplies the cookie string captured by the external auth flow.
pub trait CredentialSource: Send + Sync {
    fn credential(&self, user_id: &str) -> Result<Option<String>, StoreError>;
}
