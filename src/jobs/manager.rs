//! # Job Manager
//!
//! Tokio-backed [`JobScheduler`] with bounded parallelism.
//!
//! Jobs are pushed onto a bounded channel. A dispatcher task drains the channel
//! and spawns each job once a semaphore permit is available, so at most
//! `max_concurrent_jobs` run at the same time. Every job runs under a timeout
//! with panic catching; neither errors nor panics reach the submitter.

use super::{Job, JobScheduler};
use crate::error::{BufferError, Result};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Job manager configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobManagerConfig {
    /// Maximum number of queued jobs before submissions are rejected
    pub queue_capacity: usize,
    /// Maximum number of jobs running at once
    pub max_concurrent_jobs: usize,
    /// Upper bound on a single job's run time
    pub job_timeout_ms: u64,
}

impl Default for JobManagerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            max_concurrent_jobs: 4,
            job_timeout_ms: 30_000,
        }
    }
}

impl JobManagerConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_millis(self.job_timeout_ms)
    }
}

struct QueuedJob {
    job_id: Uuid,
    job: Box<dyn Job>,
    enqueued_at: Instant,
}

#[derive(Debug, Default)]
struct JobCounters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

/// Background job runner
pub struct JobManager {
    manager_id: String,
    config: JobManagerConfig,
    sender: Mutex<Option<mpsc::Sender<QueuedJob>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<JobCounters>,
}

impl JobManager {
    /// Create a job manager and start its dispatcher.
    ///
    /// Fails with `JobError` when called outside a Tokio runtime or when
    /// `max_concurrent_jobs` does not fit a semaphore permit count.
    pub fn new(config: JobManagerConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            BufferError::JobError(format!("JobManager requires a Tokio runtime: {e}"))
        })?;
        let permits = u32::try_from(config.max_concurrent_jobs.max(1)).map_err(|_| {
            BufferError::JobError(format!(
                "max_concurrent_jobs {} exceeds {}",
                config.max_concurrent_jobs,
                u32::MAX
            ))
        })?;

        let manager_id = format!("jobs_{}", &Uuid::new_v4().simple().to_string()[..8]);
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let counters = Arc::new(JobCounters::default());

        let dispatcher = runtime.spawn(Self::dispatch_loop(
            receiver,
            Arc::clone(&counters),
            permits,
            config.job_timeout(),
            manager_id.clone(),
        ));

        info!(
            manager_id = %manager_id,
            queue_capacity = config.queue_capacity,
            max_concurrent_jobs = config.max_concurrent_jobs,
            "JobManager started"
        );

        Ok(Self {
            manager_id,
            config,
            sender: Mutex::new(Some(sender)),
            dispatcher: Mutex::new(Some(dispatcher)),
            counters,
        })
    }

    /// Create a job manager with default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(JobManagerConfig::default())
    }

    pub fn config(&self) -> &JobManagerConfig {
        &self.config
    }

    async fn dispatch_loop(
        mut receiver: mpsc::Receiver<QueuedJob>,
        counters: Arc<JobCounters>,
        permits: u32,
        timeout: Duration,
        manager_id: String,
    ) {
        let semaphore = Arc::new(Semaphore::new(permits as usize));

        while let Some(queued) = receiver.recv().await {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    error!(
                        manager_id = %manager_id,
                        job_id = %queued.job_id,
                        "Semaphore closed - dropping job"
                    );
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            };

            let counters = Arc::clone(&counters);
            let manager_id = manager_id.clone();
            tokio::spawn(async move {
                Self::execute_job(queued, timeout, &counters, &manager_id).await;
                drop(permit);
            });
        }

        // Queue closed: wait for in-flight jobs to release their permits
        if let Ok(permits) = semaphore.acquire_many(permits).await {
            drop(permits);
        }

        info!(manager_id = %manager_id, "JobManager dispatcher stopped - queue closed");
    }

    async fn execute_job(
        queued: QueuedJob,
        timeout: Duration,
        counters: &JobCounters,
        manager_id: &str,
    ) {
        let QueuedJob {
            job_id,
            job,
            enqueued_at,
        } = queued;
        let job_name = job.name().to_string();

        debug!(
            manager_id = %manager_id,
            job_id = %job_id,
            job_name = %job_name,
            queued_ms = enqueued_at.elapsed().as_millis() as u64,
            "Running job"
        );

        let started = Instant::now();
        let outcome = tokio::time::timeout(timeout, AssertUnwindSafe(job.run()).catch_unwind()).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(Ok(()))) => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
                crate::logging::log_job_operation(
                    "run",
                    &job_id.to_string(),
                    &job_name,
                    "completed",
                    Some(duration_ms),
                    None,
                );
            }
            Ok(Ok(Err(e))) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    manager_id = %manager_id,
                    job_id = %job_id,
                    job_name = %job_name,
                    duration_ms = duration_ms,
                    error = %e,
                    "Job failed"
                );
            }
            Ok(Err(_)) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    manager_id = %manager_id,
                    job_id = %job_id,
                    job_name = %job_name,
                    "Job panicked"
                );
            }
            Err(_) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    manager_id = %manager_id,
                    job_id = %job_id,
                    job_name = %job_name,
                    timeout_ms = timeout.as_millis() as u64,
                    "Job timed out"
                );
            }
        }
    }

    /// Stop accepting jobs and wait for queued and running jobs to finish
    pub async fn shutdown(&self) {
        let sender = self.sender.lock().take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        info!(manager_id = %self.manager_id, "JobManager shutting down");

        let dispatcher = self.dispatcher.lock().take();
        if let Some(handle) = dispatcher {
            if let Err(e) = handle.await {
                error!(manager_id = %self.manager_id, error = %e, "Dispatcher task failed");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Get job counters
    pub fn stats(&self) -> JobManagerStats {
        JobManagerStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
        }
    }
}

impl JobScheduler for JobManager {
    fn submit(&self, job: Box<dyn Job>) {
        let job_id = Uuid::new_v4();
        let job_name = job.name().to_string();

        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            warn!(
                manager_id = %self.manager_id,
                job_name = %job_name,
                "Job rejected - manager is shut down"
            );
            return;
        };

        let queued = QueuedJob {
            job_id,
            job,
            enqueued_at: Instant::now(),
        };

        match sender.try_send(queued) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                debug!(
                    manager_id = %self.manager_id,
                    job_id = %job_id,
                    job_name = %job_name,
                    "Job queued"
                );
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(
                    manager_id = %self.manager_id,
                    job_name = %job_name,
                    queue_capacity = self.config.queue_capacity,
                    "Job rejected - queue full"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(
                    manager_id = %self.manager_id,
                    job_name = %job_name,
                    "Job rejected - queue closed"
                );
            }
        }
    }
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("manager_id", &self.manager_id)
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Job execution counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobManagerStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub rejected: u64,
}

impl JobManagerStats {
    /// Jobs queued or running
    pub fn pending(&self) -> u64 {
        self.submitted
            .saturating_sub(self.completed)
            .saturating_sub(self.failed)
    }
}
