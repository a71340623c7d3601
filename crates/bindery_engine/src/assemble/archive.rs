use std::io::{Seek, Write};

use bindery_core::OrderedEntry;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::EntryEmitter;
use crate::AssemblyError;

/// Writes one zip member per entry straight into the sink.
pub struct ArchiveEmitter<W: Write + Seek> {
    writer: ZipWriter<W>,
    options: SimpleFileOptions,
}

impl<W: Write + Seek> ArchiveEmitter<W> {
    pub fn new(sink: W, compression_level: i64) -> Self {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(compression_level));
        Self {
            writer: ZipWriter::new(sink),
            options,
        }
    }
}

impl<W: Write + Seek> EntryEmitter for ArchiveEmitter<W> {
    type Output = W;

    fn append(&mut self, entry: &OrderedEntry, image: &[u8]) -> Result<(), AssemblyError> {
        self.writer.start_file(entry.file_name(), self.options)?;
        self.writer.write_all(image)?;
        Ok(())
    }

    fn finalize(self) -> Result<W, AssemblyError> {
        // The central directory is only written here.
        let mut sink = self.writer.finish()?;
        sink.flush()?;
        Ok(sink)
    }
}
