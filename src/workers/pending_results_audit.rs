use crate::drill::ResultCache;

/// Reports users whose answers never reached the provider. Resending stays a
/// user action.
pub async fn run(cache: &dyn ResultCache) {
    tracing::debug!("pending_results_audit: start");
    match cache.pending_users() {
        Ok(users) if users.is_empty() => tracing::debug!("pending_results_audit: cache empty"),
        Ok(users) => {
            let words: usize = users.iter().map(|(_, n)| n).sum();
            for (user_id, pending) in &users {
                tracing::warn!(user_id = %user_id, pending, "Unsent training results");
            }
            tracing::info!(users = users.len(), words, "pending_results_audit: done");
        }
        Err(e) => tracing::error!(error = %e, "pending_results_audit failed"),
    }
}
