use std::collections::HashSet;

use crate::{JobDescription, JobId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("job has no pages and no covers")]
    EmptyJob,
    #[error("duplicate page number {0}")]
    DuplicatePageNumber(u32),
    #[error("job id must not be empty")]
    EmptyJobId,
    #[error("document name must not be empty")]
    EmptyDocumentName,
    #[error("invalid image url for {field}: {url} ({reason})")]
    InvalidUrl {
        field: String,
        url: String,
        reason: String,
    },
    #[error("job {0} is already queued or running")]
    JobAlreadyActive(JobId),
}

/// Check a description before it is allowed into the queue.
///
/// Ordering-level checks (empty job, duplicate page numbers) are repeated here
/// so a bad job is rejected at submission instead of failing later in a worker.
pub fn validate_job(job: &JobDescription) -> Result<(), ValidationError> {
    if job.job_id.trim().is_empty() {
        return Err(ValidationError::EmptyJobId);
    }
    if job.document_name.trim().is_empty() {
        return Err(ValidationError::EmptyDocumentName);
    }
    if job.pages.is_empty() && job.covers.is_empty() {
        return Err(ValidationError::EmptyJob);
    }

    let mut seen = HashSet::with_capacity(job.pages.len());
    for page in &job.pages {
        if page.page_number > 0 && !seen.insert(page.page_number) {
            return Err(ValidationError::DuplicatePageNumber(page.page_number));
        }
        check_url(&format!("page {}", page.page_number), &page.image_url)?;
    }

    let covers = [
        ("leading cover", &job.covers.leading),
        ("chapter cover", &job.covers.chapter),
        ("trailing cover", &job.covers.trailing),
    ];
    for (field, url) in covers {
        if let Some(url) = url {
            check_url(field, url)?;
        }
    }
    Ok(())
}

fn check_url(field: &str, raw: &str) -> Result<(), ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidUrl {
        field: field.to_string(),
        url: raw.to_string(),
        reason,
    };
    let parsed = url::Url::parse(raw.trim()).map_err(|err| invalid(err.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme {other}"))),
    }
}
