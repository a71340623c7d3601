use bindery_core::QualityProfile;

/// Tunables behind one quality profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSettings {
    /// Images wider than this are downscaled, keeping aspect ratio.
    pub max_width: Option<u32>,
    /// Only used when the profile emits JPEG.
    pub jpeg_quality: u8,
    /// Deflate level for archive members (1 = fastest, 9 = smallest).
    pub archive_compression_level: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileTable {
    pub high_fidelity: ProfileSettings,
    pub compressed: ProfileSettings,
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self {
            high_fidelity: ProfileSettings {
                max_width: None,
                jpeg_quality: 95,
                archive_compression_level: 1,
            },
            compressed: ProfileSettings {
                max_width: Some(1280),
                jpeg_quality: 80,
                archive_compression_level: 9,
            },
        }
    }
}

impl ProfileTable {
    pub fn get(&self, profile: QualityProfile) -> &ProfileSettings {
        match profile {
            QualityProfile::HighFidelity => &self.high_fidelity,
            QualityProfile::Compressed => &self.compressed,
        }
    }
}
