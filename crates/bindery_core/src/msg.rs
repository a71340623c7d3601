use crate::JobId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// A validated job was handed to the queue.
    Submitted { job_id: JobId },
    /// A running job reached a terminal state.
    Finished { job_id: JobId, outcome: JobOutcome },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed { reason: String },
}
