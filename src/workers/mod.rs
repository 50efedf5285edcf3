pub mod idle_session_sweep;
pub mod pending_results_audit;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::{TrainingConfig, WorkerConfig};
use crate::constants::{IDLE_SWEEP_CRON, PENDING_AUDIT_CRON, WORKER_JOB_TIMEOUT_SECS};
use crate::drill::{ResultCache, TrainingEngine};

const WORKER_TIMEOUT: Duration = Duration::from_secs(WORKER_JOB_TIMEOUT_SECS);

/// Drain period before scheduler shutdown to let in-flight tasks complete.
#[cfg(test)]
const DRAIN_TIMEOUT: Duration = Duration::from_millis(10);
#[cfg(not(test))]
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerName {
    IdleSessionSweep,
    PendingResultsAudit,
}

impl WorkerName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IdleSessionSweep => "idle_session_sweep",
            Self::PendingResultsAudit => "pending_results_audit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub name: WorkerName,
    pub cron: &'static str,
    pub enabled: bool,
}

pub struct WorkerManager {
    engine: Arc<TrainingEngine>,
    cache: Arc<dyn ResultCache>,
    shutdown_rx: broadcast::Receiver<()>,
    config: WorkerConfig,
    idle_timeout_secs: u64,
}

impl WorkerManager {
    pub fn new(
        engine: Arc<TrainingEngine>,
        cache: Arc<dyn ResultCache>,
        shutdown_rx: broadcast::Receiver<()>,
        config: &WorkerConfig,
        training: &TrainingConfig,
    ) -> Self {
        Self {
            engine,
            cache,
            shutdown_rx,
            config: config.clone(),
            idle_timeout_secs: training.idle_timeout_secs,
        }
    }

    /// Single source of truth for all planned jobs and their cron schedules.
    pub fn planned_jobs(&self) -> Vec<JobSpec> {
        if !self.config.is_leader {
            return Vec::new();
        }

        vec![
            JobSpec {
                name: WorkerName::IdleSessionSweep,
                cron: IDLE_SWEEP_CRON,
                enabled: self.config.enable_idle_sweep,
            },
            JobSpec {
                name: WorkerName::PendingResultsAudit,
                cron: PENDING_AUDIT_CRON,
                enabled: self.config.enable_pending_audit,
            },
        ]
    }

    /// Runs the scheduler until the shutdown broadcast fires.
    pub async fn start(mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.config.is_leader {
            tracing::info!("Worker leader disabled; skipping worker startup");
            return Ok(());
        }

        let mut scheduler = JobScheduler::new().await?;

        self.register_jobs(&scheduler).await;

        scheduler.start().await?;

        tracing::info!("Worker manager started");
        let _ = self.shutdown_rx.recv().await;

        tracing::info!(
            "Worker manager shutting down, draining for {}s",
            DRAIN_TIMEOUT.as_secs()
        );
        tokio::time::sleep(DRAIN_TIMEOUT).await;
        let _ = scheduler.shutdown().await;
        Ok(())
    }

    async fn register_jobs(&self, scheduler: &JobScheduler) {
        for spec in &self.planned_jobs() {
            if !spec.enabled {
                tracing::info!(name = spec.name.as_str(), "Skipping disabled worker");
                continue;
            }

            let name_str = spec.name.as_str();
            match spec.name {
                WorkerName::IdleSessionSweep => {
                    let engine = self.engine.clone();
                    let idle_timeout_secs = self.idle_timeout_secs;
                    add_job(scheduler, spec.cron, name_str, move || {
                        let engine = engine.clone();
                        async move {
                            idle_session_sweep::run(&engine, idle_timeout_secs).await;
                        }
                    })
                    .await;
                }
                WorkerName::PendingResultsAudit => {
                    let cache = self.cache.clone();
                    add_job(scheduler, spec.cron, name_str, move || {
                        let cache = cache.clone();
                        async move {
                            pending_results_audit::run(cache.as_ref()).await;
                        }
                    })
                    .await;
                }
            }
            tracing::info!(name = name_str, cron = spec.cron, "Registered worker");
        }
    }
}

/// Add a job to the scheduler with an overlap guard and timeout wrapper.
async fn add_job<Fut, F>(scheduler: &JobScheduler, cron: &str, name: &'static str, mut run: F)
where
    F: FnMut() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let running = Arc::new(AtomicBool::new(false));

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let guard = running.clone();

        if guard
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!(worker = name, "Previous run still in progress, skipping");
            return Box::pin(async {});
        }

        let fut = run();
        Box::pin(async move {
            if tokio::time::timeout(WORKER_TIMEOUT, fut).await.is_err() {
                tracing::error!(
                    worker = name,
                    timeout_secs = WORKER_TIMEOUT.as_secs(),
                    "Worker timed out"
                );
            }
            guard.store(false, Ordering::SeqCst);
        })
    });

    match job {
        Ok(job) => {
            if let Err(err) = scheduler.add(job).await {
                tracing::error!(error = %err, cron, worker = name, "Failed to add worker job");
            }
        }
        Err(err) => tracing::error!(error = %err, cron, worker = name, "Failed to create worker job"),
    }
}
