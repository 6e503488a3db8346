use std::fs;

use spinner_engine::{ensure_output_dir, SnapshotWriter};
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
fn snapshot_replaces_previous_document() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("nested").join("page.html");
    let writer = SnapshotWriter::new(target.clone());

    writer.write("<p>first</p>").unwrap();
    assert_eq!(fs::read_to_string(&target).unwrap(), "<p>first</p>");

    writer.write("<p>second</p>").unwrap();
    assert_eq!(fs::read_to_string(&target).unwrap(), "<p>second</p>");
    assert_eq!(fs::read_dir(target.parent().unwrap()).unwrap().count(), 1);
}

#[test]
fn no_partial_file_on_error() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = SnapshotWriter::new(file_path.join("page.html"));
    assert!(writer.write("data").is_err());
    assert_eq!(fs::read_to_string(&file_path).unwrap(), "x");
}
