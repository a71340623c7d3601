use std::fs;

use bindery_engine::{ensure_output_dir, AtomicFileWriter};
use tempfile::TempDir;

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("out");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing_artifact() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("Moon Harbor - Chapter 7.cbz", b"PK first").unwrap();
    assert_eq!(first.file_name().unwrap(), "Moon Harbor - Chapter 7.cbz");
    assert_eq!(fs::read(&first).unwrap(), b"PK first");

    let second = writer.write("Moon Harbor - Chapter 7.cbz", b"PK second").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read(&second).unwrap(), b"PK second");
}

#[test]
fn write_from_streams_reader_and_counts_bytes() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().join("nested"));

    let payload = vec![0x25u8; 70_000];
    let mut reader = payload.as_slice();
    let (path, written) = writer.write_from("chapter.pdf", &mut reader).unwrap();

    assert_eq!(written, 70_000);
    assert_eq!(fs::read(path).unwrap(), payload);
}

#[test]
fn no_partial_file_on_error() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    let result = writer.write("chapter.cbz", b"data");
    assert!(result.is_err());
    assert!(!file_path.with_file_name("chapter.cbz").exists());
}
