//! Bounded-concurrency FIFO job queue.
//!
//! Scheduling decisions come from the pure [`bindery_core::update`] state
//! machine. This module owns the mutex around that state, the job bodies
//! waiting for a slot, and the tasks that run admitted jobs. A slot is only
//! ever freed and refilled inside one critical section. Notifiers are
//! never called with that lock held.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use bindery_core::{
    update, validate_job, Effect, JobDescription, JobId, JobOutcome, JobPhase, Msg, QueueSnapshot,
    QueueState, ValidationError,
};
use bindery_logging::{bindery_info, bindery_warn};
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::{AssemblyStats, BuildError, StatusNotifier, StatusUpdate};

/// What a successful job body hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub token: String,
    pub filename: String,
    pub mime_type: String,
    pub byte_len: u64,
    pub stats: AssemblyStats,
}

/// The body of a job. Runs once per admitted job on the queue's runtime.
#[async_trait::async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: JobDescription) -> Result<JobReport, BuildError>;
}

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub job_id: JobId,
    /// `0` when the job started immediately, otherwise its place in line.
    pub position: usize,
}

struct Shared {
    state: QueueState,
    pending: HashMap<JobId, JobDescription>,
    /// Finished jobs whose terminal update is still being delivered.
    notifying: usize,
}

struct QueueInner {
    shared: Mutex<Shared>,
    runner: Arc<dyn JobRunner>,
    notifier: Arc<dyn StatusNotifier>,
    runtime: Handle,
    outstanding: watch::Sender<usize>,
}

#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<QueueInner>,
}

impl JobQueue {
    pub fn new(
        state: QueueState,
        runner: Arc<dyn JobRunner>,
        notifier: Arc<dyn StatusNotifier>,
        runtime: Handle,
    ) -> Self {
        let (outstanding, _) = watch::channel(0);
        Self {
            inner: Arc::new(QueueInner {
                shared: Mutex::new(Shared {
                    state,
                    pending: HashMap::new(),
                    notifying: 0,
                }),
                runner,
                notifier,
                runtime,
                outstanding,
            }),
        }
    }

    /// Validate and enqueue a job. Never blocks on the job itself.
    pub fn submit(&self, job: JobDescription) -> Result<Admission, ValidationError> {
        if let Err(err) = validate_job(&job) {
            bindery_warn!("Rejected job {}: {}", job.job_id, err);
            return Err(err);
        }

        let job_id = job.job_id.clone();
        let (starts, position) = {
            let mut shared = self.inner.lock();
            let effects = shared.apply(Msg::Submitted {
                job_id: job_id.clone(),
            });
            if effects
                .iter()
                .any(|effect| matches!(effect, Effect::Rejected { .. }))
            {
                bindery_warn!("Rejected job {}: already queued or running", job_id);
                return Err(ValidationError::JobAlreadyActive(job_id));
            }
            shared.pending.insert(job_id.clone(), job);
            let starts = shared.take_started(&effects);
            let position = shared.state.position(&job_id).unwrap_or(0);
            self.inner.publish_outstanding(&shared);
            (starts, position)
        };

        bindery_info!("Accepted job {} at position {}", job_id, position);
        launch(&self.inner, starts);
        Ok(Admission { job_id, position })
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.inner.lock().state.snapshot()
    }

    pub fn phase(&self, job_id: &str) -> Option<JobPhase> {
        self.inner.lock().state.phase(job_id).cloned()
    }

    /// Resolves once nothing is queued or running.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.outstanding.subscribe();
        let _ = rx.wait_for(|outstanding| *outstanding == 0).await;
    }
}

impl QueueInner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Idle is only observable once every terminal update has gone out.
    fn publish_outstanding(&self, shared: &Shared) {
        let state = &shared.state;
        self.outstanding
            .send_replace(state.running_count() + state.waiting_count() + shared.notifying);
    }
}

impl Shared {
    fn apply(&mut self, msg: Msg) -> Vec<Effect> {
        let current = std::mem::take(&mut self.state);
        let (next, effects) = update(current, msg);
        self.state = next;
        effects
    }

    fn take_started(&mut self, effects: &[Effect]) -> Vec<JobDescription> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Start { job_id } => self.pending.remove(job_id),
                Effect::Rejected { .. } => None,
            })
            .collect()
    }
}

fn launch(inner: &Arc<QueueInner>, jobs: Vec<JobDescription>) {
    for job in jobs {
        let inner_for_task = Arc::clone(inner);
        inner.runtime.spawn(run_one(inner_for_task, job));
    }
}

async fn run_one(inner: Arc<QueueInner>, job: JobDescription) {
    let job_id = job.job_id.clone();
    bindery_info!("Job {} running", job_id);
    inner.notifier.notify(StatusUpdate::processing(&job_id));

    // A nested task so a panicking job body surfaces as a JoinError here.
    let runner = Arc::clone(&inner.runner);
    let result = inner
        .runtime
        .spawn(async move { runner.run(job).await })
        .await;

    let (outcome, status) = match result {
        Ok(Ok(report)) => {
            bindery_info!(
                "Job {} completed: {} entries, {} bytes",
                job_id,
                report.stats.entries,
                report.byte_len
            );
            let status = StatusUpdate::completed(
                &job_id,
                report.token,
                report.filename,
                report.mime_type,
                report.byte_len,
                report.stats,
            );
            (JobOutcome::Completed, status)
        }
        Ok(Err(err)) => {
            let reason = err.to_string();
            bindery_warn!("Job {} failed: {}", job_id, reason);
            let status = StatusUpdate::failed(&job_id, &reason);
            (JobOutcome::Failed { reason }, status)
        }
        Err(join_err) => {
            let reason = if join_err.is_panic() {
                format!("job panicked: {}", panic_message(join_err.into_panic()))
            } else {
                format!("job aborted: {join_err}")
            };
            bindery_warn!("Job {} failed: {}", job_id, reason);
            let status = StatusUpdate::failed(&job_id, &reason);
            (JobOutcome::Failed { reason }, status)
        }
    };

    let starts = {
        let mut shared = inner.lock();
        let effects = shared.apply(Msg::Finished {
            job_id: job_id.clone(),
            outcome,
        });
        shared.notifying += 1;
        shared.take_started(&effects)
    };

    // Called outside the lock: notifiers may query the queue.
    inner.notifier.notify(status);

    {
        let mut shared = inner.lock();
        shared.notifying -= 1;
        inner.publish_outstanding(&shared);
    }

    launch(&inner, starts);
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        return (*text).to_string();
    }
    if let Some(text) = payload.downcast_ref::<String>() {
        return text.clone();
    }
    "unknown panic".to_string()
}
