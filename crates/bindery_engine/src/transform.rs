use std::io::Cursor;

use bindery_core::QualityProfile;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};

use crate::{ProfileTable, TransformError};

/// Re-encodes one image under a quality profile. Treated as a pure function.
pub trait ImageTransform: Send + Sync {
    fn transform(&self, bytes: Vec<u8>, profile: QualityProfile)
        -> Result<Vec<u8>, TransformError>;
}

/// Hands bytes through untouched. Useful when sources are already in the target format.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughTransform;

impl ImageTransform for PassthroughTransform {
    fn transform(
        &self,
        bytes: Vec<u8>,
        _profile: QualityProfile,
    ) -> Result<Vec<u8>, TransformError> {
        Ok(bytes)
    }
}

/// Decodes with the `image` crate, downscales, and re-encodes to the
/// profile's format (PNG for high-fidelity, JPEG for compressed).
#[derive(Debug, Default, Clone)]
pub struct ReencodeTransform {
    profiles: ProfileTable,
}

impl ReencodeTransform {
    pub fn new(profiles: ProfileTable) -> Self {
        Self { profiles }
    }
}

impl ImageTransform for ReencodeTransform {
    fn transform(
        &self,
        bytes: Vec<u8>,
        profile: QualityProfile,
    ) -> Result<Vec<u8>, TransformError> {
        let settings = self.profiles.get(profile);
        let decoded = image::load_from_memory(&bytes)
            .map_err(|err| TransformError(format!("decode failed: {err}")))?;
        drop(bytes);

        let resized = match settings.max_width {
            Some(max_width) if decoded.width() > max_width => {
                decoded.resize(max_width, u32::MAX, FilterType::Triangle)
            }
            _ => decoded,
        };

        let mut out = Vec::new();
        match profile {
            QualityProfile::HighFidelity => encode_png(&resized, &mut out)?,
            QualityProfile::Compressed => encode_jpeg(&resized, settings.jpeg_quality, &mut out)?,
        }
        Ok(out)
    }
}

fn encode_png(image: &DynamicImage, out: &mut Vec<u8>) -> Result<(), TransformError> {
    image
        .write_to(&mut Cursor::new(out), ImageFormat::Png)
        .map_err(|err| TransformError(format!("png encode failed: {err}")))
}

fn encode_jpeg(image: &DynamicImage, quality: u8, out: &mut Vec<u8>) -> Result<(), TransformError> {
    // JPEG has no alpha channel.
    let rgb = image.to_rgb8();
    JpegEncoder::new_with_quality(out, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|err| TransformError(format!("jpeg encode failed: {err}")))
}
