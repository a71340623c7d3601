//! Ephemeral store for finished build output.
//!
//! Artifacts are consumed on retrieval and expire after a fixed horizon.
//! Expiry is enforced lazily on every `put`/`get` and periodically by an
//! optional sweeper task. All removals go through one mutex and take the
//! artifact out of the map, so a retrieval racing the sweep yields exactly one
//! owner and storage is released exactly once.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bindery_logging::{bindery_debug, bindery_info};
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{NotFoundError, StorageError};

/// Expiry horizon used when none is configured.
pub const DEFAULT_ARTIFACT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub type Token = String;

/// Backing storage for an artifact. Dropping it releases the storage.
#[derive(Debug)]
pub enum ArtifactPayload {
    Memory(Bytes),
    /// Deleted from disk when dropped.
    Spooled(NamedTempFile),
}

impl ArtifactPayload {
    pub fn len(&self) -> io::Result<u64> {
        match self {
            ArtifactPayload::Memory(bytes) => Ok(bytes.len() as u64),
            ArtifactPayload::Spooled(file) => Ok(file.as_file().metadata()?.len()),
        }
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// A reader positioned at the start of the payload.
    pub fn reader(&self) -> io::Result<Box<dyn Read + Send + '_>> {
        match self {
            ArtifactPayload::Memory(bytes) => Ok(Box::new(bytes.as_ref())),
            ArtifactPayload::Spooled(file) => {
                let mut handle: File = file.reopen()?;
                handle.seek(SeekFrom::Start(0))?;
                Ok(Box::new(handle))
            }
        }
    }

    pub fn to_bytes(&self) -> io::Result<Bytes> {
        match self {
            ArtifactPayload::Memory(bytes) => Ok(bytes.clone()),
            ArtifactPayload::Spooled(_) => {
                let mut out = Vec::new();
                self.reader()?.read_to_end(&mut out)?;
                Ok(Bytes::from(out))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMeta {
    pub job_id: String,
    pub mime_type: String,
    pub filename: String,
}

#[derive(Debug)]
pub struct Artifact {
    pub token: Token,
    pub payload: ArtifactPayload,
    pub meta: ArtifactMeta,
    pub created_at: SystemTime,
}

/// Where finished output goes. The local [`ArtifactStore`] is one
/// implementation; an object-storage uploader would be another.
pub trait ArtifactSink: Send + Sync {
    fn publish(&self, payload: ArtifactPayload, meta: ArtifactMeta) -> Result<Token, StorageError>;
}

struct Stored {
    artifact: Artifact,
    expires_at: Instant,
}

#[derive(Default)]
struct StoreInner {
    entries: HashMap<Token, Stored>,
    /// Sorted by expiry so sweeps stop at the first live entry.
    by_expiry: BTreeSet<(Instant, Token)>,
}

impl StoreInner {
    fn take(&mut self, token: &str) -> Option<Stored> {
        let stored = self.entries.remove(token)?;
        self.by_expiry
            .remove(&(stored.expires_at, token.to_string()));
        Some(stored)
    }

    fn expire(&mut self, now: Instant) -> Vec<Stored> {
        let mut expired = Vec::new();
        while let Some((at, token)) = self.by_expiry.first().cloned() {
            if at > now {
                break;
            }
            self.by_expiry.remove(&(at, token.clone()));
            if let Some(stored) = self.entries.remove(&token) {
                expired.push(stored);
            }
        }
        expired
    }
}

pub struct ArtifactStore {
    ttl: Duration,
    inner: Mutex<StoreInner>,
    counter: AtomicU64,
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new(DEFAULT_ARTIFACT_TTL)
    }
}

impl ArtifactStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(StoreInner::default()),
            counter: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store a payload and return the token that retrieves it.
    pub fn put(&self, payload: ArtifactPayload, meta: ArtifactMeta) -> Token {
        let now = Instant::now();
        let created_at = SystemTime::now();
        let expired;
        let token;
        {
            let mut inner = self.lock();
            expired = inner.expire(now);
            let mut candidate = self.new_token(&meta.job_id, created_at);
            while inner.entries.contains_key(&candidate) {
                candidate = self.new_token(&meta.job_id, created_at);
            }
            token = candidate;
            let expires_at = now + self.ttl;
            inner.by_expiry.insert((expires_at, token.clone()));
            bindery_info!(
                "Stored artifact {} for job {} ({})",
                token,
                meta.job_id,
                meta.filename
            );
            inner.entries.insert(
                token.clone(),
                Stored {
                    artifact: Artifact {
                        token: token.clone(),
                        payload,
                        meta,
                        created_at,
                    },
                    expires_at,
                },
            );
        }
        log_expired(&expired);
        token
    }

    /// Take an artifact out of the store. A second call with the same token fails.
    pub fn take(&self, token: &str) -> Result<Artifact, NotFoundError> {
        let now = Instant::now();
        let (found, expired) = {
            let mut inner = self.lock();
            let expired = inner.expire(now);
            (inner.take(token), expired)
        };
        log_expired(&expired);
        match found {
            Some(stored) => {
                bindery_info!("Artifact {} handed out", token);
                Ok(stored.artifact)
            }
            None => Err(NotFoundError {
                token: token.to_string(),
            }),
        }
    }

    /// Drop an artifact without reading it. Removing a missing token is not an error.
    pub fn remove(&self, token: &str) -> bool {
        let removed = self.lock().take(token);
        removed.is_some()
    }

    pub fn contains(&self, token: &str) -> bool {
        let inner = self.lock();
        inner
            .entries
            .get(token)
            .is_some_and(|stored| stored.expires_at > Instant::now())
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove everything past its horizon. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let expired = self.lock().expire(Instant::now());
        log_expired(&expired);
        expired.len()
    }

    /// Run [`ArtifactStore::sweep`] every `interval` until `cancel` fires or the store is dropped.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(store) = store.upgrade() else {
                            break;
                        };
                        let dropped = store.sweep();
                        if dropped > 0 {
                            bindery_debug!("Sweep dropped {} expired artifacts", dropped);
                        }
                    }
                }
            }
        })
    }

    fn new_token(&self, job_id: &str, created_at: SystemTime) -> Token {
        let nanos = created_at
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);

        let mut hasher = Sha256::new();
        hasher.update(job_id.as_bytes());
        hasher.update(nanos.to_be_bytes());
        hasher.update(seq.to_be_bytes());
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(32);
        for byte in digest.iter().take(16) {
            use std::fmt::Write;
            let _ = write!(&mut hex, "{byte:02x}");
        }
        hex
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ArtifactSink for ArtifactStore {
    fn publish(&self, payload: ArtifactPayload, meta: ArtifactMeta) -> Result<Token, StorageError> {
        Ok(self.put(payload, meta))
    }
}

fn log_expired(expired: &[Stored]) {
    for stored in expired {
        bindery_info!(
            "Artifact {} for job {} expired",
            stored.artifact.token,
            stored.artifact.meta.job_id
        );
    }
}
