use thiserror::Error;

use super::provider::ProviderError;
use super::session::SessionPhase;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum DrillError {
    #[error("provider authentication failed: {0}")]
    Auth(String),

    #[error("could not fetch words: {0}")]
    Fetch(ProviderError),

    #[error("provider returned no trainable words")]
    EmptyWords,

    #[error("local vocabulary has no words due for review")]
    NoVocabulary,

    #[error("batch submission failed: {0}")]
    Submission(ProviderError),

    #[error("a training session is already active")]
    SessionAlreadyActive,

    #[error("no active training session")]
    NoActiveSession,

    #[error("session is {0}, not accepting answers")]
    NotAcceptingAnswers(SessionPhase),

    #[error("answer for word {got} but word {expected} is being shown")]
    StaleAnswer { expected: usize, got: usize },

    #[error("option {0} is not offered for this word")]
    UnknownOption(String),

    #[error("invalid phase transition {from} -> {to}")]
    InvalidTransition { from: SessionPhase, to: SessionPhase },

    #[error("no unsent results to resend")]
    NothingToResend,

    #[error("no report available")]
    ReportNotReady,

    #[error("invalid word entry: {0}")]
    InvalidWord(String),

    #[error("could not add word: {0}")]
    AddWord(ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DrillError {
    /// Learner-facing explanation; each abort reason reads differently.
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth(_) => {
                "Could not sign in to the dictionary service. Please refresh your login and try again."
                    .to_string()
            }
            Self::Fetch(_) => {
                "The dictionary service did not answer. Please try again in a few minutes.".to_string()
            }
            Self::EmptyWords => "There are no words to train right now.".to_string(),
            Self::NoVocabulary => {
                "No words in your local vocabulary are due. Sync your dictionary or come back later."
                    .to_string()
            }
            Self::Submission(_) => {
                "Your answers were saved but could not be sent. Use resend to try again.".to_string()
            }
            Self::SessionAlreadyActive => {
                "A training is already in progress. Finish or cancel it first.".to_string()
            }
            Self::NoActiveSession => "There is no training in progress.".to_string(),
            Self::NotAcceptingAnswers(_) | Self::InvalidTransition { .. } => {
                "This training is no longer waiting for answers.".to_string()
            }
            Self::StaleAnswer { .. } => "That answer belongs to an earlier word.".to_string(),
            Self::UnknownOption(_) => "That option is not available for this word.".to_string(),
            Self::NothingToResend => "There are no unsent results.".to_string(),
            Self::ReportNotReady => "No finished training to report yet.".to_string(),
            Self::InvalidWord(_) => "Send a word and its translation, both non-empty.".to_string(),
            Self::AddWord(_) => {
                "The dictionary service did not accept the word. Please try again later.".to_string()
            }
            Self::Store(_) => "Something went wrong while saving your progress.".to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth(_) => "PROVIDER_AUTH",
            Self::Fetch(_) => "PROVIDER_UNAVAILABLE",
            Self::EmptyWords => "NO_WORDS",
            Self::NoVocabulary => "NO_DUE_WORDS",
            Self::Submission(_) => "SUBMISSION_FAILED",
            Self::SessionAlreadyActive => "SESSION_ACTIVE",
            Self::NoActiveSession => "NO_SESSION",
            Self::NotAcceptingAnswers(_) => "NOT_ACCEPTING_ANSWERS",
            Self::StaleAnswer { .. } => "STALE_ANSWER",
            Self::UnknownOption(_) => "UNKNOWN_OPTION",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::NothingToResend => "NOTHING_TO_RESEND",
            Self::ReportNotReady => "REPORT_NOT_READY",
            Self::InvalidWord(_) => "INVALID_WORD",
            Self::AddWord(_) => "WORD_NOT_ADDED",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// Provider auth failures abort; everything else fetch-side is a fetch error.
    pub fn from_fetch(e: ProviderError) -> Self {
        match e {
            ProviderError::Auth(msg) => Self::Auth(msg),
            other => Self::Fetch(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_reasons_have_distinct_messages() {
        let msgs = [
            DrillError::Auth("x".into()).user_message(),
            DrillError::EmptyWords.user_message(),
            DrillError::Submission(ProviderError::Network("x".into())).user_message(),
            DrillError::Fetch(ProviderError::Network("x".into())).user_message(),
        ];
        for (i, a) in msgs.iter().enumerate() {
            for b in msgs.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn fetch_auth_is_promoted() {
        assert!(matches!(
            DrillError::from_fetch(ProviderError::Auth("expired".into())),
            DrillError::Auth(_)
        ));
        assert!(matches!(
            DrillError::from_fetch(ProviderError::Api { status: 500, message: String::new() }),
            DrillError::Fetch(_)
        ));
    }
}
