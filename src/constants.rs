/// Maximum compare-and-swap attempts before a store write gives up.
pub const MAX_CAS_RETRIES: u32 = 20;

/// Cron for the idle-session sweep (every minute).
pub const IDLE_SWEEP_CRON: &str = "0 * * * * *";

/// Cron for the unsent-results audit (hourly).
pub const PENDING_AUDIT_CRON: &str = "0 15 * * * *";

/// Upper bound for one scheduled job run.
pub const WORKER_JOB_TIMEOUT_SECS: u64 = 120;

/// Request header carrying the correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest word or translation accepted for a dictionary add.
pub const MAX_WORD_CHARS: usize = 100;
