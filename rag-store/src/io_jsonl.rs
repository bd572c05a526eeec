//! JSONL helpers for the file-backed stores.
//!
//! - [`read_all`]: typed, tolerant reader (malformed lines are logged and skipped).
//! - [`write_all`] / [`append_all`]: one serialized row per line.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::errors::RagError;

/// Reads every parseable row. A missing file is an empty store.
pub fn read_all<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, RagError> {
    if !path.exists() {
        debug!(?path, "jsonl file does not exist yet");
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let mut out = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(v) => out.push(v),
            Err(e) => warn!(?path, line = i + 1, error = %e, "skipping malformed JSONL row"),
        }
    }
    debug!(?path, rows = out.len(), "jsonl loaded");
    Ok(out)
}

/// Replaces the file contents with `rows`.
pub fn write_all<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), RagError> {
    ensure_parent(path)?;
    let mut w = BufWriter::new(File::create(path)?);
    for row in rows {
        serde_json::to_writer(&mut w, row)?;
        w.write_all(b"\n")?;
    }
    w.flush()?;
    Ok(())
}

/// Appends `rows`, creating the file if needed.
pub fn append_all<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), RagError> {
    ensure_parent(path)?;
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut w = BufWriter::new(file);
    for row in rows {
        serde_json::to_writer(&mut w, row)?;
        w.write_all(b"\n")?;
    }
    w.flush()?;
    Ok(())
}

/// Removes the file if present.
pub fn remove(path: &Path) -> Result<(), RagError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn ensure_parent(path: &Path) -> Result<(), RagError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        n: u32,
    }

    #[test]
    fn append_then_read_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/rows.jsonl");
        append_all(&path, &[Row { n: 1 }]).unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"{broken\n\n")
            .unwrap();
        append_all(&path, &[Row { n: 2 }]).unwrap();

        let rows: Vec<Row> = read_all(&path).unwrap();
        assert_eq!(rows, vec![Row { n: 1 }, Row { n: 2 }]);
    }

    #[test]
    fn missing_file_reads_empty_and_removes_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("none.jsonl");
        assert!(read_all::<Row>(&path).unwrap().is_empty());
        remove(&path).unwrap();
    }
}
