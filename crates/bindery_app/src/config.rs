//! Optional RON configuration for the command-line runner.
//!
//! Every field may be omitted; omitted fields keep the engine defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use bindery_engine::{EngineConfig, SpoolTarget};
use ron::extensions::Extensions;
use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub max_concurrent: Option<usize>,
    pub history_limit: Option<usize>,
    pub artifact_ttl_secs: Option<u64>,
    /// `0` turns the periodic sweep off.
    pub sweep_interval_secs: Option<u64>,
    /// Spool assembled output to temp files here instead of memory.
    pub spool_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub redirect_limit: Option<usize>,
    pub max_image_bytes: Option<u64>,
    pub compressed_max_width: Option<u32>,
    pub compressed_jpeg_quality: Option<u8>,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let options = ron::Options::default().with_default_extension(Extensions::IMPLICIT_SOME);
        Ok(options.from_str(text)?)
    }

    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        if let Some(max) = self.max_concurrent {
            config.max_concurrent = max;
        }
        if let Some(limit) = self.history_limit {
            config.history_limit = limit;
        }
        if let Some(secs) = self.artifact_ttl_secs {
            config.artifact_ttl = Duration::from_secs(secs);
        }
        match self.sweep_interval_secs {
            Some(0) => config.sweep_interval = None,
            Some(secs) => config.sweep_interval = Some(Duration::from_secs(secs)),
            None => {}
        }
        if let Some(dir) = &self.spool_dir {
            config.spool = SpoolTarget::TempDir(dir.clone());
        }
        if let Some(secs) = self.connect_timeout_secs {
            config.fetch.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.request_timeout_secs {
            config.fetch.request_timeout = Duration::from_secs(secs);
        }
        if let Some(limit) = self.redirect_limit {
            config.fetch.redirect_limit = limit;
        }
        if let Some(max) = self.max_image_bytes {
            config.fetch.max_bytes = max;
        }
        if let Some(width) = self.compressed_max_width {
            config.profiles.compressed.max_width = Some(width);
        }
        if let Some(quality) = self.compressed_jpeg_quality {
            config.profiles.compressed.jpeg_quality = quality;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn empty_config_keeps_engine_defaults() {
        let config = AppConfig::parse("()").unwrap();
        assert_eq!(config, AppConfig::default());

        let engine = config.engine_config();
        let defaults = EngineConfig::default();
        assert_eq!(engine.max_concurrent, defaults.max_concurrent);
        assert_eq!(engine.artifact_ttl, defaults.artifact_ttl);
        assert_eq!(engine.spool, SpoolTarget::Memory);
    }

    #[test]
    fn fields_override_engine_settings() {
        let config = AppConfig::parse(
            r#"(
                max_concurrent: 4,
                artifact_ttl_secs: 600,
                sweep_interval_secs: 0,
                spool_dir: "/var/tmp/bindery",
                request_timeout_secs: 12,
                compressed_max_width: 960,
            )"#,
        )
        .unwrap();

        let engine = config.engine_config();
        assert_eq!(engine.max_concurrent, 4);
        assert_eq!(engine.artifact_ttl, Duration::from_secs(600));
        assert_eq!(engine.sweep_interval, None);
        assert_eq!(engine.spool, SpoolTarget::TempDir(PathBuf::from("/var/tmp/bindery")));
        assert_eq!(engine.fetch.request_timeout, Duration::from_secs(12));
        assert_eq!(engine.profiles.compressed.max_width, Some(960));
    }

    #[test]
    fn unknown_field_is_an_error() {
        assert!(AppConfig::parse("(max_workers: 3)").is_err());
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "(history_limit: 12)").unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.history_limit, Some(12));
        assert_eq!(config.engine_config().history_limit, 12);
    }
}
