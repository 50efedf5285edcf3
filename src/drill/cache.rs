use serde::Serialize;

use super::types::{OutcomeCode, PendingResults};
use crate::store::StoreError;

/// Durable per-user map of outcomes not yet acknowledged by the provider.
///
/// Every write is flushed before returning; a crash after `persist_outcome`
/// never loses that answer.
pub trait ResultCache: Send + Sync {
    fn load(&self, user_id: &str) -> Result<PendingResults, StoreError>;

    fn persist_outcome(
        &self,
        user_id: &str,
        word_id: &str,
        outcome: OutcomeCode,
    ) -> Result<(), StoreError>;

    /// Removes entries equal to the submitted ones and reports whether the
    /// cache held anything beforehand. Entries written after the snapshot
    /// was taken survive.
    fn clear_submitted(&self, user_id: &str, submitted: &PendingResults)
        -> Result<bool, StoreError>;

    /// Users with unsent outcomes and how many each holds.
    fn pending_users(&self) -> Result<Vec<(String, usize)>, StoreError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub has_pending: bool,
    pub pending_count: usize,
}

impl CacheStatus {
    pub fn of(results: &PendingResults) -> Self {
        Self {
            has_pending: !results.is_empty(),
            pending_count: results.len(),
        }
    }
}
