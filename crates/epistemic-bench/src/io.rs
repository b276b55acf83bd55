//! Flat-file plumbing shared by dataset loaders, runners and scorers.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Read a JSONL file, skipping malformed rows with a logged warning.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut rows = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(row) => rows.push(row),
            Err(e) => {
                tracing::warn!(
                    "Skipping malformed row {} in {}: {}",
                    lineno + 1,
                    path.display(),
                    e
                );
            }
        }
    }
    Ok(rows)
}

/// Write rows to a JSONL file, replacing any previous content.
pub fn write_jsonl<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    for row in rows {
        let line = serde_json::to_string(row)?;
        writeln!(file, "{}", line)?;
    }
    Ok(())
}

/// Append one record to a JSONL log. Runs append as items complete so an
/// interrupted run still leaves a usable log.
pub fn append_jsonl<T: Serialize>(path: &Path, row: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let line = serde_json::to_string(row)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Row {
        id: String,
        value: i64,
    }

    #[test]
    fn test_jsonl_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.jsonl");

        let rows = vec![
            Row {
                id: "a".into(),
                value: 1,
            },
            Row {
                id: "b".into(),
                value: 2,
            },
        ];
        write_jsonl(&path, &rows).unwrap();

        let back: Vec<Row> = read_jsonl(&path).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.jsonl");
        std::fs::write(
            &path,
            "{\"id\": \"a\", \"value\": 1}\nnot json\n{\"id\": \"c\", \"value\": 3}\n",
        )
        .unwrap();

        let back: Vec<Row> = read_jsonl(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[1].id, "c");
    }

    #[test]
    fn test_append_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");

        append_jsonl(
            &path,
            &Row {
                id: "a".into(),
                value: 1,
            },
        )
        .unwrap();
        append_jsonl(
            &path,
            &Row {
                id: "b".into(),
                value: 2,
            },
        )
        .unwrap();

        let back: Vec<Row> = read_jsonl(&path).unwrap();
        assert_eq!(back.len(), 2);
    }
}
