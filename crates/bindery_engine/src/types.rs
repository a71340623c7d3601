use std::fmt;

use bindery_core::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    pub final_url: String,
    pub redirect_count: usize,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransformError(pub String);

#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive writer failed: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("document writer failed: {0}")]
    Document(#[from] lopdf::Error),
    #[error("cannot place image {label}: {message}")]
    Image { label: String, message: String },
}

/// Everything that can end a running job in the failed state.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid job: {0}")]
    Validation(#[from] ValidationError),
    #[error("failed to fetch {label} from {url}: {source}")]
    SourceFetch {
        label: String,
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("failed to transform {label} from {url}: {source}")]
    Transform {
        label: String,
        url: String,
        #[source]
        source: TransformError,
    },
    #[error("assembly failed: {0}")]
    Assembly(#[from] AssemblyError),
    #[error("storing artifact failed: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct StorageError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("artifact {token} not found or expired")]
pub struct NotFoundError {
    pub token: String,
}
