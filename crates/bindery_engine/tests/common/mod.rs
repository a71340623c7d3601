#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use bindery_core::{CoverSet, JobDescription, OutputKind, PageItem, QualityProfile};
use bindery_engine::{FailureKind, FetchError, FetchMetadata, FetchOutput, ImageFetcher};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

pub fn init_logging() {
    bindery_logging::initialize_for_tests();
}

pub fn url(name: &str) -> String {
    format!("https://img.example.com/{name}")
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Jpeg)
}

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([40, 90, 160]));
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), format)
        .expect("encode sample image");
    out
}

pub fn job(
    job_id: &str,
    output_kind: OutputKind,
    pages: &[(u32, &str)],
    covers: CoverSet,
) -> JobDescription {
    JobDescription {
        job_id: job_id.to_string(),
        document_name: "Moon Harbor".to_string(),
        sequence_number: 7,
        output_kind,
        quality_profile: QualityProfile::Compressed,
        pages: pages
            .iter()
            .map(|(number, name)| PageItem::new(*number, url(name)))
            .collect(),
        covers,
    }
}

/// In-process fetcher serving canned images by URL.
#[derive(Default)]
pub struct FakeFetcher {
    images: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, name: &str, bytes: Vec<u8>) -> Self {
        self.images.insert(url(name), bytes);
        self
    }

    pub fn failing(mut self, name: &str) -> Self {
        self.failing.insert(url(name));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(url) {
            return Err(FetchError::new(FailureKind::HttpStatus(500), "500 Internal Server Error"));
        }
        let bytes = self
            .images
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::new(FailureKind::HttpStatus(404), "404 Not Found"))?;
        Ok(FetchOutput {
            metadata: FetchMetadata {
                original_url: url.to_string(),
                final_url: url.to_string(),
                redirect_count: 0,
                content_type: Some("image/png".to_string()),
                byte_len: bytes.len() as u64,
            },
            bytes,
        })
    }
}
