use crate::JobId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// A worker slot was granted; the job body must be started now.
    Start { job_id: JobId },
    /// Submission refused because the id is still queued or running.
    Rejected { job_id: JobId },
}
