use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::io;

/// One stored model response, aligned with its dataset item by index.
/// `response` is `None` when the API call failed; such items are
/// excluded from aggregates rather than scored as zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub index: usize,
    pub id: Option<String>,
    pub response: Option<String>,
    pub error: Option<String>,
    pub provider: String,
    pub model: String,
    pub timestamp: DateTime<Utc>,
}

impl ResponseRecord {
    pub fn success(
        index: usize,
        id: Option<String>,
        response: String,
        provider: &str,
        model: &str,
    ) -> Self {
        Self {
            index,
            id,
            response: Some(response),
            error: None,
            provider: provider.to_string(),
            model: model.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn failure(
        index: usize,
        id: Option<String>,
        error: String,
        provider: &str,
        model: &str,
    ) -> Self {
        Self {
            index,
            id,
            response: None,
            error: Some(error),
            provider: provider.to_string(),
            model: model.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Write the canonical JSONL response file plus a CSV mirror next to it.
pub fn write_response_files(records: &[ResponseRecord], jsonl_path: &Path) -> Result<()> {
    io::write_jsonl(jsonl_path, records)?;

    let csv_path = jsonl_path.with_extension("csv");
    let mut df = df!(
        "index" => records.iter().map(|r| r.index as i64).collect::<Vec<i64>>(),
        "id" => records.iter().map(|r| r.id.clone()).collect::<Vec<Option<String>>>(),
        "response" => records.iter().map(|r| r.response.clone()).collect::<Vec<Option<String>>>(),
        "error" => records.iter().map(|r| r.error.clone()).collect::<Vec<Option<String>>>(),
        "provider" => records.iter().map(|r| r.provider.clone()).collect::<Vec<String>>(),
        "model" => records.iter().map(|r| r.model.clone()).collect::<Vec<String>>(),
        "timestamp" => records.iter().map(|r| r.timestamp.to_rfc3339()).collect::<Vec<String>>(),
    )?;

    let mut file = File::create(&csv_path)
        .with_context(|| format!("Failed to create {}", csv_path.display()))?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    Ok(())
}

/// Load a response file and key it by item index. Duplicate indices keep
/// the last occurrence so a re-run wins over stale rows.
pub fn load_responses(jsonl_path: &Path) -> Result<HashMap<usize, ResponseRecord>> {
    let records: Vec<ResponseRecord> = io::read_jsonl(jsonl_path)?;
    let mut by_index = HashMap::with_capacity(records.len());
    for record in records {
        by_index.insert(record.index, record);
    }
    Ok(by_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("truthfulqa_test-model.jsonl");

        let records = vec![
            ResponseRecord::success(0, Some("F1".into()), "Paris.".into(), "groq", "m"),
            ResponseRecord::failure(1, Some("F2".into()), "Rate limit".into(), "groq", "m"),
        ];
        write_response_files(&records, &path).unwrap();

        let by_index = load_responses(&path).unwrap();
        assert_eq!(by_index.len(), 2);
        assert_eq!(by_index[&0].response.as_deref(), Some("Paris."));
        assert!(by_index[&1].response.is_none());
        assert!(path.with_extension("csv").exists());
    }

    #[test]
    fn test_duplicate_index_keeps_last() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("responses.jsonl");

        let stale = ResponseRecord::failure(0, None, "timeout".into(), "groq", "m");
        let fresh = ResponseRecord::success(0, None, "Paris.".into(), "groq", "m");
        crate::io::write_jsonl(&path, &[stale, fresh]).unwrap();

        let by_index = load_responses(&path).unwrap();
        assert_eq!(by_index.len(), 1);
        assert_eq!(by_index[&0].response.as_deref(), Some("Paris."));
    }
}
