use std::fs;
use std::sync::Arc;
use std::time::Duration;

use bindery_core::{JobDescription, JobPhase, QueueState, DEFAULT_HISTORY_LIMIT, DEFAULT_MAX_CONCURRENT};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::artifact::{Artifact, ArtifactStore, DEFAULT_ARTIFACT_TTL};
use crate::{
    BuildPipeline, FetchSettings, ImageFetcher, ImageTransform, JobQueue, NotFoundError,
    ProfileTable, ReencodeTransform, ReqwestFetcher, SpoolTarget, StatusNotifier,
    StreamingAssembler,
};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_concurrent: usize,
    pub history_limit: usize,
    pub artifact_ttl: Duration,
    /// `None` disables the periodic sweep; expiry is then only checked on access.
    pub sweep_interval: Option<Duration>,
    pub spool: SpoolTarget,
    pub fetch: FetchSettings,
    pub profiles: ProfileTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            history_limit: DEFAULT_HISTORY_LIMIT,
            artifact_ttl: DEFAULT_ARTIFACT_TTL,
            sweep_interval: Some(Duration::from_secs(5 * 60)),
            spool: SpoolTarget::Memory,
            fetch: FetchSettings::default(),
            profiles: ProfileTable::default(),
        }
    }
}

/// Synchronous answer to a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmitResponse {
    /// HTTP status an outer listener should answer with.
    pub fn status_code(&self) -> u16 {
        if self.accepted {
            202
        } else {
            400
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub queue_depth: usize,
    pub running: usize,
    pub max_concurrent: usize,
    pub stored_artifacts: usize,
    pub resident_memory_bytes: Option<u64>,
}

/// Entry point for callers: submit jobs, query them, collect artifacts.
pub struct EngineHandle {
    queue: JobQueue,
    store: Arc<ArtifactStore>,
    sweeper: CancellationToken,
}

impl EngineHandle {
    /// Engine backed by the HTTP fetcher and the `image`-crate transform.
    pub fn new(config: EngineConfig, notifier: Arc<dyn StatusNotifier>, runtime: Handle) -> Self {
        let fetcher = Arc::new(ReqwestFetcher::new(config.fetch.clone()));
        let transform = Arc::new(ReencodeTransform::new(config.profiles.clone()));
        Self::with_collaborators(config, fetcher, transform, notifier, runtime)
    }

    pub fn with_collaborators(
        config: EngineConfig,
        fetcher: Arc<dyn ImageFetcher>,
        transform: Arc<dyn ImageTransform>,
        notifier: Arc<dyn StatusNotifier>,
        runtime: Handle,
    ) -> Self {
        let store = Arc::new(ArtifactStore::new(config.artifact_ttl));
        let sweeper = CancellationToken::new();
        if let Some(interval) = config.sweep_interval {
            let _guard = runtime.enter();
            store.spawn_sweeper(interval, sweeper.clone());
        }

        let assembler = StreamingAssembler::new(
            fetcher,
            transform,
            config.profiles.clone(),
            config.fetch.request_timeout,
        );
        let pipeline = BuildPipeline::new(assembler, store.clone(), config.spool.clone());
        let state = QueueState::with_history_limit(config.max_concurrent, config.history_limit);
        let queue = JobQueue::new(state, Arc::new(pipeline), notifier, runtime);

        Self {
            queue,
            store,
            sweeper,
        }
    }

    pub fn submit(&self, job: JobDescription) -> SubmitResponse {
        match self.queue.submit(job) {
            Ok(admission) => SubmitResponse {
                accepted: true,
                job_id: Some(admission.job_id),
                queue_position: Some(admission.position),
                error: None,
            },
            Err(err) => SubmitResponse {
                accepted: false,
                job_id: None,
                queue_position: None,
                error: Some(err.to_string()),
            },
        }
    }

    pub fn job_phase(&self, job_id: &str) -> Option<JobPhase> {
        self.queue.phase(job_id)
    }

    /// Consume an artifact. The token is dead afterwards.
    pub fn take_artifact(&self, token: &str) -> Result<Artifact, NotFoundError> {
        self.store.take(token)
    }

    pub fn health(&self) -> HealthSnapshot {
        let snapshot = self.queue.snapshot();
        HealthSnapshot {
            queue_depth: snapshot.depth(),
            running: snapshot.running_count(),
            max_concurrent: snapshot.max_concurrent,
            stored_artifacts: self.store.len(),
            resident_memory_bytes: resident_memory_bytes(),
        }
    }

    pub async fn wait_idle(&self) {
        self.queue.wait_idle().await;
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.sweeper.cancel();
    }
}

/// Resident set size from `/proc/self/status`; `None` where that file does not exist.
fn resident_memory_bytes() -> Option<u64> {
    let status = fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|line| line.starts_with("VmRSS:"))?;
    let kib: u64 = line
        .trim_start_matches("VmRSS:")
        .split_whitespace()
        .next()?
        .parse()
        .ok()?;
    Some(kib * 1024)
}
