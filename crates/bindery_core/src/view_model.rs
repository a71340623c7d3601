use crate::JobId;

/// Read-only picture of the queue, for status/health surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueueSnapshot {
    pub max_concurrent: usize,
    pub running: Vec<JobId>,
    /// Waiting jobs, front of the line first.
    pub waiting: Vec<JobId>,
    pub started_total: u64,
}

impl QueueSnapshot {
    pub fn depth(&self) -> usize {
        self.waiting.len()
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }
}
