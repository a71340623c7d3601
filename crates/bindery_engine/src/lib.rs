//! Bindery engine: fetching, assembly, queueing, and artifact storage.
mod artifact;
mod assemble;
mod engine;
mod fetch;
mod filename;
mod notify;
mod persist;
mod pipeline;
mod profile;
mod queue;
mod transform;
mod types;

pub use artifact::{
    Artifact, ArtifactMeta, ArtifactPayload, ArtifactSink, ArtifactStore, Token,
    DEFAULT_ARTIFACT_TTL,
};
pub use assemble::{
    ArchiveEmitter, Assembled, AssemblyStats, BufferGauge, BufferLease, DocumentEmitter,
    EntryEmitter, StreamingAssembler,
};
pub use engine::{EngineConfig, EngineHandle, HealthSnapshot, SubmitResponse};
pub use fetch::{FetchSettings, ImageFetcher, ReqwestFetcher};
pub use filename::artifact_filename;
pub use notify::{
    ChannelNotifier, FanoutNotifier, JobStatus, LogNotifier, StatusNotifier, StatusPayload,
    StatusUpdate,
};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use pipeline::{BuildPipeline, SpoolTarget};
pub use profile::{ProfileSettings, ProfileTable};
pub use queue::{Admission, JobQueue, JobReport, JobRunner};
pub use transform::{ImageTransform, PassthroughTransform, ReencodeTransform};
pub use types::{
    AssemblyError, BuildError, FailureKind, FetchError, FetchMetadata, FetchOutput,
    NotFoundError, StorageError, TransformError,
};
