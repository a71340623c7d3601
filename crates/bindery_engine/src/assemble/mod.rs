//! Streaming assembly: turns an ordered entry list into one output artifact.
//!
//! Entries are processed strictly one at a time. Each entry is fetched,
//! transformed, handed to the emitter, and dropped before the next one is
//! fetched, so peak working memory is one image regardless of job size.

mod archive;
mod document;
mod gauge;

use std::io::{Seek, Write};
use std::sync::Arc;
use std::time::Duration;

use bindery_core::{OrderedEntry, OutputKind, QualityProfile};
use bindery_logging::bindery_debug;

use crate::{
    AssemblyError, BuildError, FailureKind, FetchError, ImageFetcher, ImageTransform,
    ProfileTable, TransformError,
};

pub use archive::ArchiveEmitter;
pub use document::DocumentEmitter;
pub use gauge::{BufferGauge, BufferLease};

/// Output strategy: receives transformed images in order, then finalizes.
pub trait EntryEmitter {
    type Output;

    fn append(&mut self, entry: &OrderedEntry, image: &[u8]) -> Result<(), AssemblyError>;

    /// Writes trailing metadata. The output is not valid until this returns.
    fn finalize(self) -> Result<Self::Output, AssemblyError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssemblyStats {
    pub entries: usize,
    /// Bytes handed to the emitter, after transformation.
    pub image_bytes: u64,
    /// Most entry buffers alive at the same time during the run.
    pub peak_live_buffers: usize,
}

#[derive(Debug)]
pub struct Assembled<W> {
    pub sink: W,
    pub stats: AssemblyStats,
}

pub struct StreamingAssembler {
    fetcher: Arc<dyn ImageFetcher>,
    transform: Arc<dyn ImageTransform>,
    profiles: ProfileTable,
    fetch_timeout: Duration,
}

impl StreamingAssembler {
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        transform: Arc<dyn ImageTransform>,
        profiles: ProfileTable,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            transform,
            profiles,
            fetch_timeout,
        }
    }

    /// Assemble `entries` into `sink` using the strategy for `kind`.
    pub async fn assemble<W>(
        &self,
        entries: &[OrderedEntry],
        kind: OutputKind,
        profile: QualityProfile,
        sink: W,
    ) -> Result<Assembled<W>, BuildError>
    where
        W: Write + Seek + Send,
    {
        let (sink, stats) = match kind {
            OutputKind::Archive => {
                let level = self.profiles.get(profile).archive_compression_level;
                self.drain(entries, profile, ArchiveEmitter::new(sink, level))
                    .await?
            }
            OutputKind::PagedDocument => {
                self.drain(entries, profile, DocumentEmitter::new(sink))
                    .await?
            }
        };
        Ok(Assembled { sink, stats })
    }

    /// Feed every entry through `emitter` in order, then finalize it.
    pub async fn drain<E>(
        &self,
        entries: &[OrderedEntry],
        profile: QualityProfile,
        mut emitter: E,
    ) -> Result<(E::Output, AssemblyStats), BuildError>
    where
        E: EntryEmitter + Send,
    {
        let gauge = Arc::new(BufferGauge::default());
        let mut stats = AssemblyStats::default();

        for entry in entries {
            let lease = gauge.lease();
            let image = self.load_entry(entry, profile).await?;
            emitter.append(entry, &image)?;
            stats.entries += 1;
            stats.image_bytes += image.len() as u64;
            drop(image);
            drop(lease);
        }

        let output = emitter.finalize()?;
        stats.peak_live_buffers = gauge.peak();
        Ok((output, stats))
    }

    async fn load_entry(
        &self,
        entry: &OrderedEntry,
        profile: QualityProfile,
    ) -> Result<Vec<u8>, BuildError> {
        let source_error = |source: FetchError| BuildError::SourceFetch {
            label: entry.label.clone(),
            url: entry.source.clone(),
            source,
        };

        let fetched = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(&entry.source))
            .await
            .map_err(|_| {
                source_error(FetchError::new(
                    FailureKind::Timeout,
                    format!("no response within {:?}", self.fetch_timeout),
                ))
            })?
            .map_err(source_error)?;
        bindery_debug!(
            "Fetched {} ({} bytes) from {}",
            entry.label,
            fetched.bytes.len(),
            entry.source
        );

        let transform = self.transform.clone();
        let bytes = fetched.bytes;
        tokio::task::spawn_blocking(move || transform.transform(bytes, profile))
            .await
            .unwrap_or_else(|err| Err(TransformError(format!("transform task aborted: {err}"))))
            .map_err(|source| BuildError::Transform {
                label: entry.label.clone(),
                url: entry.source.clone(),
                source,
            })
    }
}
