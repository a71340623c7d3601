use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::view_model::QueueSnapshot;
use crate::{JobId, JobOutcome};

/// Concurrency limit used when none is configured.
pub const DEFAULT_MAX_CONCURRENT: usize = 2;
/// Number of terminal job records kept for status lookups.
pub const DEFAULT_HISTORY_LIMIT: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPhase {
    Queued,
    Running,
    Completed,
    Failed { reason: String },
}

impl JobPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Completed | JobPhase::Failed { .. })
    }
}

/// Scheduler bookkeeping. Only [`crate::update`] mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueState {
    max_concurrent: usize,
    history_limit: usize,
    waiting: VecDeque<JobId>,
    running: BTreeSet<JobId>,
    phases: HashMap<JobId, JobPhase>,
    finished: VecDeque<JobId>,
    started_total: u64,
}

impl Default for QueueState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

impl QueueState {
    /// A limit of zero is raised to one so the queue can always drain.
    pub fn new(max_concurrent: usize) -> Self {
        Self::with_history_limit(max_concurrent, DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(max_concurrent: usize, history_limit: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            history_limit,
            waiting: VecDeque::new(),
            running: BTreeSet::new(),
            phases: HashMap::new(),
            finished: VecDeque::new(),
            started_total: 0,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    pub fn phase(&self, job_id: &str) -> Option<&JobPhase> {
        self.phases.get(job_id)
    }

    pub fn is_active(&self, job_id: &str) -> bool {
        matches!(
            self.phases.get(job_id),
            Some(JobPhase::Queued | JobPhase::Running)
        )
    }

    /// `0` for a running job, `n` for the n-th job in the waiting line.
    pub fn position(&self, job_id: &str) -> Option<usize> {
        if self.running.contains(job_id) {
            return Some(0);
        }
        self.waiting
            .iter()
            .position(|queued| queued == job_id)
            .map(|idx| idx + 1)
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            max_concurrent: self.max_concurrent,
            running: self.running.iter().cloned().collect(),
            waiting: self.waiting.iter().cloned().collect(),
            started_total: self.started_total,
        }
    }

    pub(crate) fn enqueue(&mut self, job_id: JobId) {
        self.phases.insert(job_id.clone(), JobPhase::Queued);
        self.waiting.push_back(job_id);
    }

    /// Fill free slots from the front of the line; returns the jobs started.
    pub(crate) fn admit(&mut self) -> Vec<JobId> {
        let mut started = Vec::new();
        while self.running.len() < self.max_concurrent {
            let Some(next) = self.waiting.pop_front() else {
                break;
            };
            self.phases.insert(next.clone(), JobPhase::Running);
            self.running.insert(next.clone());
            self.started_total += 1;
            started.push(next);
        }
        started
    }

    /// Returns false when the job was not running (stale or duplicate report).
    pub(crate) fn finish(&mut self, job_id: &str, outcome: JobOutcome) -> bool {
        if !self.running.remove(job_id) {
            return false;
        }
        let phase = match outcome {
            JobOutcome::Completed => JobPhase::Completed,
            JobOutcome::Failed { reason } => JobPhase::Failed { reason },
        };
        self.phases.insert(job_id.to_string(), phase);
        self.finished.retain(|done| done != job_id);
        self.finished.push_back(job_id.to_string());
        self.prune_history();
        true
    }

    fn prune_history(&mut self) {
        while self.finished.len() > self.history_limit {
            if let Some(oldest) = self.finished.pop_front() {
                if self.phases.get(&oldest).is_some_and(JobPhase::is_terminal) {
                    self.phases.remove(&oldest);
                }
            }
        }
    }
}
