use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use bindery_core::{order_job, JobDescription};
use bindery_logging::bindery_debug;
use bytes::Bytes;
use tempfile::NamedTempFile;

use crate::artifact::{ArtifactMeta, ArtifactPayload, ArtifactSink};
use crate::filename::artifact_filename;
use crate::{AssemblyError, BuildError, JobReport, JobRunner, StorageError, StreamingAssembler};

/// Where assembled output is written while a job runs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SpoolTarget {
    #[default]
    Memory,
    /// Temp files in this directory, deleted when the artifact is dropped.
    TempDir(PathBuf),
}

/// Job body: order, assemble, publish.
pub struct BuildPipeline {
    assembler: StreamingAssembler,
    sink: Arc<dyn ArtifactSink>,
    spool: SpoolTarget,
}

impl BuildPipeline {
    pub fn new(assembler: StreamingAssembler, sink: Arc<dyn ArtifactSink>, spool: SpoolTarget) -> Self {
        Self {
            assembler,
            sink,
            spool,
        }
    }
}

#[async_trait::async_trait]
impl JobRunner for BuildPipeline {
    async fn run(&self, job: JobDescription) -> Result<JobReport, BuildError> {
        let entries = order_job(&job)?;
        bindery_debug!("Job {} ordered into {} entries", job.job_id, entries.len());

        let kind = job.output_kind;
        let profile = job.quality_profile;
        let (payload, stats) = match &self.spool {
            SpoolTarget::Memory => {
                let assembled = self
                    .assembler
                    .assemble(&entries, kind, profile, Cursor::new(Vec::new()))
                    .await?;
                let bytes = Bytes::from(assembled.sink.into_inner());
                (ArtifactPayload::Memory(bytes), assembled.stats)
            }
            SpoolTarget::TempDir(dir) => {
                let file = NamedTempFile::new_in(dir).map_err(AssemblyError::Io)?;
                let assembled = self
                    .assembler
                    .assemble(&entries, kind, profile, file)
                    .await?;
                (ArtifactPayload::Spooled(assembled.sink), assembled.stats)
            }
        };

        let byte_len = payload
            .len()
            .map_err(|err| StorageError(format!("cannot stat assembled output: {err}")))?;
        let meta = ArtifactMeta {
            job_id: job.job_id.clone(),
            mime_type: kind.mime_type().to_string(),
            filename: artifact_filename(&job.document_name, job.sequence_number, kind),
        };
        let filename = meta.filename.clone();
        let mime_type = meta.mime_type.clone();
        let token = self.sink.publish(payload, meta)?;

        Ok(JobReport {
            token,
            filename,
            mime_type,
            byte_len,
            stats,
        })
    }
}
