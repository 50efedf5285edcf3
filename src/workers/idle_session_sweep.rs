use chrono::Duration;

use crate::drill::TrainingEngine;

/// Idle threshold for `idle_timeout_secs`, saturating instead of overflowing.
pub fn idle_threshold(idle_timeout_secs: u64) -> Duration {
    i64::try_from(idle_timeout_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

/// Cancels abandoned quizzes and drops final reports nobody fetched within
/// the same timeout.
pub async fn run(engine: &TrainingEngine, idle_timeout_secs: u64) {
    tracing::debug!("idle_session_sweep: start");
    let idle_for = idle_threshold(idle_timeout_secs);
    let cancelled = engine.cancel_idle_sessions(idle_for).await;
    let expired = engine.expire_reports(idle_for).await;
    if cancelled > 0 || expired > 0 {
        tracing::info!(cancelled, expired, idle_timeout_secs, "idle_session_sweep: done");
    } else {
        tracing::debug!("idle_session_sweep: nothing idle");
    }
}
