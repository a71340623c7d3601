use std::collections::BTreeMap;

use bindery_logging::bindery_warn;

use crate::{CoverSet, JobDescription, PageItem, QualityProfile, ValidationError};

/// Where an entry came from in the job description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntrySlot {
    LeadingCover,
    /// Either `covers.chapter` or the page-0 sentinel standing in for it.
    ChapterCover,
    Page(u32),
    TrailingCover,
}

impl EntrySlot {
    pub fn label(self) -> String {
        match self {
            EntrySlot::LeadingCover => "leading_cover".to_string(),
            EntrySlot::ChapterCover => "chapter_cover".to_string(),
            EntrySlot::Page(number) => format!("page_{number}"),
            EntrySlot::TrailingCover => "trailing_cover".to_string(),
        }
    }
}

/// One unit of output, in its final position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderedEntry {
    pub index: usize,
    pub slot: EntrySlot,
    pub label: String,
    pub source: String,
    pub extension: &'static str,
}

impl OrderedEntry {
    /// Member name used inside archives: zero-padded so readers sort by sequence.
    pub fn file_name(&self) -> String {
        format!("{:04}_{}.{}", self.index, self.label, self.extension)
    }
}

/// Compute the canonical emission order for a job.
///
/// Leading cover, then the chapter cover (or the page-0 sentinel when no
/// explicit chapter cover is given), then pages ascending by number, then the
/// trailing cover. Indices are dense and start at 0.
pub fn order(
    pages: &[PageItem],
    covers: &CoverSet,
    profile: QualityProfile,
) -> Result<Vec<OrderedEntry>, ValidationError> {
    if pages.is_empty() && covers.is_empty() {
        return Err(ValidationError::EmptyJob);
    }

    let mut numbered: BTreeMap<u32, &str> = BTreeMap::new();
    let mut sentinel: Option<&str> = None;
    for page in pages {
        if page.page_number == 0 {
            match sentinel {
                None => sentinel = Some(page.image_url.as_str()),
                Some(_) => bindery_warn!(
                    "Ignoring extra page-0 item {}; first one wins",
                    page.image_url
                ),
            }
            continue;
        }
        if numbered
            .insert(page.page_number, page.image_url.as_str())
            .is_some()
        {
            return Err(ValidationError::DuplicatePageNumber(page.page_number));
        }
    }

    let chapter = covers.chapter.as_deref().or(sentinel);

    let mut slots: Vec<(EntrySlot, &str)> = Vec::with_capacity(numbered.len() + 3);
    if let Some(url) = covers.leading.as_deref() {
        slots.push((EntrySlot::LeadingCover, url));
    }
    if let Some(url) = chapter {
        slots.push((EntrySlot::ChapterCover, url));
    }
    slots.extend(
        numbered
            .into_iter()
            .map(|(number, url)| (EntrySlot::Page(number), url)),
    );
    if let Some(url) = covers.trailing.as_deref() {
        slots.push((EntrySlot::TrailingCover, url));
    }

    let extension = profile.image_extension();
    Ok(slots
        .into_iter()
        .enumerate()
        .map(|(index, (slot, url))| OrderedEntry {
            index,
            slot,
            label: slot.label(),
            source: url.to_string(),
            extension,
        })
        .collect())
}

pub fn order_job(job: &JobDescription) -> Result<Vec<OrderedEntry>, ValidationError> {
    order(&job.pages, &job.covers, job.quality_profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_slot_names() {
        assert_eq!(EntrySlot::LeadingCover.label(), "leading_cover");
        assert_eq!(EntrySlot::Page(12).label(), "page_12");
    }

    #[test]
    fn file_name_is_zero_padded() {
        let entry = OrderedEntry {
            index: 7,
            slot: EntrySlot::Page(3),
            label: "page_3".to_string(),
            source: "https://img.example.com/3.jpg".to_string(),
            extension: "jpg",
        };
        assert_eq!(entry.file_name(), "0007_page_3.jpg");
    }
}
