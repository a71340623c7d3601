use bindery_logging::{bindery_info, bindery_warn};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::AssemblyStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

/// Extra fields carried next to the status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StatusPayload {
    Started {},
    Completed {
        token: String,
        filename: String,
        mime_type: String,
        entries: usize,
        byte_len: u64,
        peak_live_buffers: usize,
    },
    Failed {
        error: String,
    },
}

/// Wire shape: `{ "job_id": ..., "status": ..., ...payload }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(flatten)]
    pub payload: StatusPayload,
}

impl StatusUpdate {
    pub fn processing(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Processing,
            payload: StatusPayload::Started {},
        }
    }

    pub fn completed(
        job_id: impl Into<String>,
        token: String,
        filename: String,
        mime_type: String,
        byte_len: u64,
        stats: AssemblyStats,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Completed,
            payload: StatusPayload::Completed {
                token,
                filename,
                mime_type,
                entries: stats.entries,
                byte_len,
                peak_live_buffers: stats.peak_live_buffers,
            },
        }
    }

    pub fn failed(job_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Failed,
            payload: StatusPayload::Failed {
                error: error.into(),
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Receives job lifecycle transitions. Must not block.
pub trait StatusNotifier: Send + Sync {
    fn notify(&self, update: StatusUpdate);
}

/// Writes every transition to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl StatusNotifier for LogNotifier {
    fn notify(&self, update: StatusUpdate) {
        match serde_json::to_string(&update) {
            Ok(json) => bindery_info!("status {}", json),
            Err(err) => bindery_warn!("Cannot serialize status for {}: {}", update.job_id, err),
        }
    }
}

/// Forwards transitions to an async receiver.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<StatusUpdate>,
}

impl ChannelNotifier {
    pub fn new(tx: mpsc::UnboundedSender<StatusUpdate>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StatusUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl StatusNotifier for ChannelNotifier {
    fn notify(&self, update: StatusUpdate) {
        let _ = self.tx.send(update);
    }
}

/// Fans one transition out to several notifiers.
pub struct FanoutNotifier {
    targets: Vec<Box<dyn StatusNotifier>>,
}

impl FanoutNotifier {
    pub fn new(targets: Vec<Box<dyn StatusNotifier>>) -> Self {
        Self { targets }
    }
}

impl StatusNotifier for FanoutNotifier {
    fn notify(&self, update: StatusUpdate) {
        for target in &self.targets {
            target.notify(update.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_is_flattened_next_to_status() {
        let update = StatusUpdate::failed("job-9", "boom");
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(
            value,
            json!({ "job_id": "job-9", "status": "failed", "error": "boom" })
        );

        let started = serde_json::to_value(StatusUpdate::processing("job-9")).unwrap();
        assert_eq!(started, json!({ "job_id": "job-9", "status": "processing" }));
    }
}
