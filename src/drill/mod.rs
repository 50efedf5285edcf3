//! Training-session engine: payload reconciliation, the quiz state machine,
//! interval calculation and the durable result cache contract.

pub mod cache;
pub mod engine;
pub mod error;
pub mod interval;
pub mod payload;
pub mod provider;
pub mod reconcile;
pub mod remote;
pub mod report;
pub mod schedule;
pub mod session;
pub mod types;

pub use cache::{CacheStatus, ResultCache};
pub use engine::TrainingEngine;
pub use error::DrillError;
pub use provider::{CredentialSource, ProviderError, WordProvider};
pub use types::{OutcomeCode, PendingResults, TrainingType, WordRecord};
