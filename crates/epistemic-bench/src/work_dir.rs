use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;

/// Output layout for one indicator run:
///
/// ```text
/// <root>/<indicator>/responses/<part>_<model>.jsonl (+ .csv)
/// <root>/<indicator>/logs/<part>_<model>.jsonl
/// <root>/<indicator>/scores/<indicator>_<model>.json
/// <root>/<indicator>/scores/final_scores.csv
/// ```
///
/// Response and score files are overwritten on re-run; logs append.
#[derive(Debug, Clone)]
pub struct RunWorkDir {
    base_path: PathBuf,
}

impl RunWorkDir {
    pub fn new(root: &Path, indicator: &str) -> Result<Self> {
        let base_path = root.join(indicator);
        fs::create_dir_all(base_path.join("responses"))?;
        fs::create_dir_all(base_path.join("logs"))?;
        fs::create_dir_all(base_path.join("scores"))?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn response_file(&self, part: &str, model_label: &str) -> PathBuf {
        self.base_path
            .join("responses")
            .join(format!("{}_{}.jsonl", part, model_label))
    }

    pub fn log_file(&self, part: &str, model_label: &str) -> PathBuf {
        self.base_path
            .join("logs")
            .join(format!("{}_{}.jsonl", part, model_label))
    }

    pub fn score_file(&self, indicator: &str, model_label: &str) -> PathBuf {
        self.base_path
            .join("scores")
            .join(format!("{}_{}.json", indicator, model_label))
    }

    pub fn final_scores_file(&self) -> PathBuf {
        self.base_path.join("scores").join("final_scores.csv")
    }
}
