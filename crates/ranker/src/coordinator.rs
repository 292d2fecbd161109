//! Single-flight job coordination
//!
//! Each background job kind gets one [`RunCoordinator`]. At most one run of
//! a job is active at a time; a trigger that arrives while a run is active
//! is rejected with the id of the run in flight.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use followrank_common::errors::{AppError, Result};
use followrank_common::metrics;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// A background job that can be run repeatedly
#[async_trait]
pub trait Job: Send + Sync + 'static {
    type Output: Clone + Send + Sync + Serialize + 'static;

    /// Short name used in logs, metrics, and errors
    fn name(&self) -> &'static str;

    async fn run(&self) -> Result<Self::Output>;
}

/// Answer to a trigger request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TriggerOutcome {
    Started { run_id: u64 },
    AlreadyRunning { run_id: u64 },
}

impl TriggerOutcome {
    pub fn run_id(&self) -> u64 {
        match self {
            TriggerOutcome::Started { run_id } | TriggerOutcome::AlreadyRunning { run_id } => *run_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunResult<O> {
    Succeeded { output: O },
    Failed { error: String },
}

/// Record of the most recent finished run
#[derive(Debug, Clone, Serialize)]
pub struct CompletedRun<O> {
    pub run_id: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub result: RunResult<O>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatus<O> {
    pub job: &'static str,
    /// Id of the active run, if any
    pub running: Option<u64>,
    pub last: Option<CompletedRun<O>>,
}

struct RunState<O> {
    running: Option<u64>,
    last: Option<CompletedRun<O>>,
}

struct Inner<J: Job> {
    job: J,
    next_id: AtomicU64,
    state: Mutex<RunState<J::Output>>,
}

/// Guards one job kind with a single-run token
pub struct RunCoordinator<J: Job> {
    inner: Arc<Inner<J>>,
}

impl<J: Job> Clone for RunCoordinator<J> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<J: Job> RunCoordinator<J> {
    pub fn new(job: J) -> Self {
        Self {
            inner: Arc::new(Inner {
                job,
                next_id: AtomicU64::new(1),
                state: Mutex::new(RunState {
                    running: None,
                    last: None,
                }),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.job.name()
    }

    /// Start a run in the background unless one is already active
    pub async fn trigger(&self) -> TriggerOutcome {
        let run_id = match self.begin().await {
            Ok(run_id) => run_id,
            Err(active) => {
                info!(job = self.name(), run_id = active, "Run already in progress");
                return TriggerOutcome::AlreadyRunning { run_id: active };
            }
        };

        // Outcome is recorded in the status; nothing to await
        drop(self.spawn_run(run_id));

        TriggerOutcome::Started { run_id }
    }

    /// Run inline under the same guard as [`trigger`](Self::trigger)
    pub async fn run_now(&self) -> Result<J::Output> {
        let run_id = self.begin().await.map_err(|active| AppError::RunInProgress {
            job: self.name().to_string(),
            run_id: active,
        })?;
        self.spawn_run(run_id).await.map_err(|e| AppError::Internal {
            message: format!("{} run {} was aborted: {}", self.name(), run_id, e),
        })?
    }

    pub async fn status(&self) -> JobStatus<J::Output> {
        let state = self.inner.state.lock().await;
        JobStatus {
            job: self.name(),
            running: state.running,
            last: state.last.clone(),
        }
    }

    /// Claim the run token; Err carries the active run id
    async fn begin(&self) -> std::result::Result<u64, u64> {
        let mut state = self.inner.state.lock().await;
        if let Some(active) = state.running {
            return Err(active);
        }
        let run_id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        state.running = Some(run_id);
        Ok(run_id)
    }

    /// Execute on a detached task, so a caller that stops waiting does not
    /// leave the token claimed
    fn spawn_run(&self, run_id: u64) -> JoinHandle<Result<J::Output>> {
        let coordinator = self.clone();
        tokio::spawn(async move { coordinator.execute(run_id).await })
    }

    async fn execute(&self, run_id: u64) -> Result<J::Output> {
        let job = self.name();
        let started_at = Utc::now();
        let start = Instant::now();
        info!(job, run_id, "Run started");

        // A panicking job is recorded as a failed run
        let inner = Arc::clone(&self.inner);
        let outcome = match tokio::spawn(async move { inner.job.run().await }).await {
            Ok(outcome) => outcome,
            Err(e) => Err(AppError::Internal {
                message: format!("{} run {} panicked: {}", job, run_id, e),
            }),
        };
        let elapsed = start.elapsed();
        metrics::record_job(job, outcome.is_ok(), elapsed.as_secs_f64());

        let result = match &outcome {
            Ok(output) => {
                info!(job, run_id, elapsed_ms = elapsed.as_millis() as u64, "Run finished");
                RunResult::Succeeded {
                    output: output.clone(),
                }
            }
            Err(e) => {
                error!(job, run_id, error = %e, "Run failed");
                RunResult::Failed {
                    error: e.to_string(),
                }
            }
        };

        let mut state = self.inner.state.lock().await;
        if state.running != Some(run_id) {
            warn!(job, run_id, "Run token changed while running");
        }
        state.running = None;
        state.last = Some(CompletedRun {
            run_id,
            started_at,
            finished_at: Utc::now(),
            result,
        });

        outcome
    }
}
