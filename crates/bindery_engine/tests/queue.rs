mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use bindery_core::{CoverSet, JobDescription, JobPhase, OutputKind, QueueState, ValidationError};
use bindery_engine::{
    AssemblyStats, BuildError, ChannelNotifier, JobQueue, JobReport, JobRunner, JobStatus,
    StatusNotifier, StatusUpdate, StorageError,
};
use pretty_assertions::assert_eq;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Semaphore};

/// Runner whose jobs block until released from the test.
#[derive(Default)]
struct GatedRunner {
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    started: Mutex<Vec<String>>,
}

impl GatedRunner {
    fn gate(&self, job_id: &str) -> Arc<Semaphore> {
        self.gates
            .lock()
            .unwrap()
            .entry(job_id.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(0)))
            .clone()
    }

    fn release(&self, job_id: &str) {
        self.gate(job_id).add_permits(1);
    }

    fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl JobRunner for GatedRunner {
    async fn run(&self, job: JobDescription) -> Result<JobReport, BuildError> {
        self.started.lock().unwrap().push(job.job_id.clone());
        let gate = self.gate(&job.job_id);
        gate.acquire().await.unwrap().forget();

        if job.job_id.starts_with("panic") {
            panic!("runner exploded on {}", job.job_id);
        }
        if job.job_id.starts_with("fail") {
            return Err(BuildError::Storage(StorageError("disk full".to_string())));
        }
        Ok(JobReport {
            token: format!("token-{}", job.job_id),
            filename: "Moon Harbor - Chapter 7.cbz".to_string(),
            mime_type: "application/vnd.comicbook+zip".to_string(),
            byte_len: 3,
            stats: AssemblyStats {
                entries: 1,
                image_bytes: 3,
                peak_live_buffers: 1,
            },
        })
    }
}

fn sample(job_id: &str) -> JobDescription {
    common::job(job_id, OutputKind::Archive, &[(1, "p1.png")], CoverSet::default())
}

fn queue_with(
    max_concurrent: usize,
    runner: Arc<GatedRunner>,
) -> (JobQueue, mpsc::UnboundedReceiver<StatusUpdate>) {
    common::init_logging();
    let (notifier, rx) = ChannelNotifier::channel();
    let queue = JobQueue::new(
        QueueState::new(max_concurrent),
        runner,
        Arc::new(notifier),
        Handle::current(),
    );
    (queue, rx)
}

async fn next_with_status(
    rx: &mut mpsc::UnboundedReceiver<StatusUpdate>,
    status: JobStatus,
) -> StatusUpdate {
    loop {
        let update = rx.recv().await.expect("notifier channel open");
        if update.status == status {
            return update;
        }
    }
}

#[tokio::test]
async fn third_job_waits_for_a_free_slot() {
    let runner = Arc::new(GatedRunner::default());
    let (queue, mut rx) = queue_with(2, runner.clone());

    assert_eq!(queue.submit(sample("j1")).unwrap().position, 0);
    assert_eq!(queue.submit(sample("j2")).unwrap().position, 0);
    assert_eq!(queue.submit(sample("j3")).unwrap().position, 1);

    next_with_status(&mut rx, JobStatus::Processing).await;
    next_with_status(&mut rx, JobStatus::Processing).await;
    assert_eq!(queue.phase("j3"), Some(JobPhase::Queued));
    assert_eq!(queue.snapshot().running_count(), 2);

    runner.release("j1");
    let done = next_with_status(&mut rx, JobStatus::Completed).await;
    assert_eq!(done.job_id, "j1");
    let started = next_with_status(&mut rx, JobStatus::Processing).await;
    assert_eq!(started.job_id, "j3");
    assert!(queue.snapshot().running_count() <= 2);

    runner.release("j2");
    runner.release("j3");
    queue.wait_idle().await;

    assert_eq!(queue.phase("j1"), Some(JobPhase::Completed));
    assert_eq!(queue.phase("j2"), Some(JobPhase::Completed));
    assert_eq!(queue.phase("j3"), Some(JobPhase::Completed));
    assert_eq!(runner.started(), vec!["j1", "j2", "j3"]);
}

#[tokio::test]
async fn waiting_jobs_start_in_submission_order() {
    let runner = Arc::new(GatedRunner::default());
    let (queue, mut rx) = queue_with(1, runner.clone());

    for id in ["a", "b", "c", "d"] {
        queue.submit(sample(id)).unwrap();
    }
    assert_eq!(queue.snapshot().waiting, vec!["b", "c", "d"]);

    for id in ["a", "b", "c", "d"] {
        runner.release(id);
        let done = next_with_status(&mut rx, JobStatus::Completed).await;
        assert_eq!(done.job_id, id);
    }
    queue.wait_idle().await;
    assert_eq!(runner.started(), vec!["a", "b", "c", "d"]);
}

#[tokio::test]
async fn completion_carries_token_and_stats() {
    let runner = Arc::new(GatedRunner::default());
    let (queue, mut rx) = queue_with(2, runner.clone());

    queue.submit(sample("j1")).unwrap();
    runner.release("j1");
    let done = next_with_status(&mut rx, JobStatus::Completed).await;

    let value = serde_json::to_value(&done).unwrap();
    assert_eq!(value["token"], "token-j1");
    assert_eq!(value["filename"], "Moon Harbor - Chapter 7.cbz");
    assert_eq!(value["peak_live_buffers"], 1);
}

#[tokio::test]
async fn failed_job_frees_its_slot() {
    let runner = Arc::new(GatedRunner::default());
    let (queue, mut rx) = queue_with(1, runner.clone());

    queue.submit(sample("fail-1")).unwrap();
    queue.submit(sample("ok-2")).unwrap();
    runner.release("fail-1");
    runner.release("ok-2");

    let failed = next_with_status(&mut rx, JobStatus::Failed).await;
    assert_eq!(failed.job_id, "fail-1");
    queue.wait_idle().await;

    assert!(matches!(queue.phase("fail-1"), Some(JobPhase::Failed { .. })));
    assert_eq!(queue.phase("ok-2"), Some(JobPhase::Completed));
}

#[tokio::test]
async fn panicking_job_is_reported_and_queue_keeps_going() {
    let runner = Arc::new(GatedRunner::default());
    let (queue, mut rx) = queue_with(1, runner.clone());

    queue.submit(sample("panic-1")).unwrap();
    queue.submit(sample("after")).unwrap();
    runner.release("panic-1");
    runner.release("after");

    let failed = next_with_status(&mut rx, JobStatus::Failed).await;
    assert_eq!(failed.job_id, "panic-1");
    let value = serde_json::to_value(&failed).unwrap();
    assert!(value["error"]
        .as_str()
        .unwrap()
        .contains("runner exploded on panic-1"));

    queue.wait_idle().await;
    assert_eq!(queue.phase("after"), Some(JobPhase::Completed));
}

#[tokio::test]
async fn invalid_job_is_rejected_before_queueing() {
    let runner = Arc::new(GatedRunner::default());
    let (queue, _rx) = queue_with(2, runner.clone());

    let mut job = sample("empty");
    job.pages.clear();
    assert_eq!(queue.submit(job), Err(ValidationError::EmptyJob));
    assert_eq!(queue.phase("empty"), None);
    assert_eq!(queue.snapshot().depth(), 0);
    assert!(runner.started().is_empty());
}

#[tokio::test]
async fn active_job_id_cannot_be_submitted_twice() {
    let runner = Arc::new(GatedRunner::default());
    let (queue, mut rx) = queue_with(2, runner.clone());

    queue.submit(sample("dup")).unwrap();
    assert_eq!(
        queue.submit(sample("dup")),
        Err(ValidationError::JobAlreadyActive("dup".to_string()))
    );

    runner.release("dup");
    next_with_status(&mut rx, JobStatus::Completed).await;
    queue.wait_idle().await;

    runner.release("dup");
    assert_eq!(queue.submit(sample("dup")).unwrap().position, 0);
    queue.wait_idle().await;
    assert_eq!(runner.started(), vec!["dup", "dup"]);
}

#[tokio::test]
async fn wait_idle_returns_immediately_on_empty_queue() {
    let (queue, _rx) = queue_with(2, Arc::new(GatedRunner::default()));
    queue.wait_idle().await;
}

/// Reads queue state back from inside every notification.
#[derive(Default)]
struct InspectingNotifier {
    queue: OnceLock<JobQueue>,
    seen: Mutex<Vec<(String, JobStatus, Option<JobPhase>, usize)>>,
}

impl StatusNotifier for InspectingNotifier {
    fn notify(&self, update: StatusUpdate) {
        let Some(queue) = self.queue.get() else {
            return;
        };
        let phase = queue.phase(&update.job_id);
        let depth = queue.snapshot().depth();
        self.seen
            .lock()
            .unwrap()
            .push((update.job_id, update.status, phase, depth));
    }
}

#[tokio::test]
async fn notifier_may_query_the_queue() {
    common::init_logging();
    let runner = Arc::new(GatedRunner::default());
    let notifier = Arc::new(InspectingNotifier::default());
    let queue = JobQueue::new(
        QueueState::new(1),
        runner.clone(),
        notifier.clone(),
        Handle::current(),
    );
    let _ = notifier.queue.set(queue.clone());

    queue.submit(sample("n1")).unwrap();
    queue.submit(sample("n2")).unwrap();
    runner.release("n1");
    runner.release("n2");

    tokio::time::timeout(Duration::from_secs(5), queue.wait_idle())
        .await
        .expect("queue went idle");

    let seen = notifier.seen.lock().unwrap().clone();
    let terminal: Vec<_> = seen
        .iter()
        .filter(|(_, status, _, _)| *status == JobStatus::Completed)
        .collect();
    assert_eq!(terminal.len(), 2);
    assert_eq!(terminal[0].0, "n1");
    assert_eq!(terminal[0].2, Some(JobPhase::Completed));
    assert_eq!(terminal[1].0, "n2");
    assert_eq!(terminal[1].3, 0);
    assert_eq!(queue.phase("n2"), Some(JobPhase::Completed));
}
