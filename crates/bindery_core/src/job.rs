use serde::{Deserialize, Serialize};

/// Caller-supplied job identifier.
pub type JobId = String;

/// What kind of artifact a job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputKind {
    /// Compressed container, one member per ordered entry.
    Archive,
    /// Paginated document, one page per ordered entry.
    PagedDocument,
}

impl OutputKind {
    pub fn file_extension(self) -> &'static str {
        match self {
            OutputKind::Archive => "cbz",
            OutputKind::PagedDocument => "pdf",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputKind::Archive => "application/vnd.comicbook+zip",
            OutputKind::PagedDocument => "application/pdf",
        }
    }
}

/// Named bundle of resize/re-encode settings applied to every image of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualityProfile {
    HighFidelity,
    Compressed,
}

impl QualityProfile {
    /// Extension of every image emitted under this profile. One per job, never mixed.
    pub fn image_extension(self) -> &'static str {
        match self {
            QualityProfile::HighFidelity => "png",
            QualityProfile::Compressed => "jpg",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageItem {
    /// `0` is the chapter-cover sentinel; see [`crate::order`].
    pub page_number: u32,
    pub image_url: String,
}

impl PageItem {
    pub fn new(page_number: u32, image_url: impl Into<String>) -> Self {
        Self {
            page_number,
            image_url: image_url.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoverSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leading: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailing: Option<String>,
}

impl CoverSet {
    pub fn is_empty(&self) -> bool {
        self.leading.is_none() && self.chapter.is_none() && self.trailing.is_none()
    }
}

/// One build request, as received from a submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescription {
    pub job_id: JobId,
    pub document_name: String,
    pub sequence_number: u32,
    pub output_kind: OutputKind,
    pub quality_profile: QualityProfile,
    #[serde(default)]
    pub pages: Vec<PageItem>,
    #[serde(default)]
    pub covers: CoverSet,
}
