pub mod attribution;
pub mod citation;
pub mod factuality;
pub mod uncertainty;

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use epistemic::Provider;

use crate::report::IndicatorReport;
use crate::thresholds::Thresholds;
use crate::work_dir::RunWorkDir;

/// Request-shaping the indicator wants for its prompts.
#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: Option<i32>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: Some(256),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunContext {
    pub dataset_dir: PathBuf,
    pub work_dir: RunWorkDir,
    pub model_label: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ScoreContext {
    pub dataset_dir: PathBuf,
    pub work_dir: RunWorkDir,
    pub model_label: String,
    pub thresholds: Thresholds,
    /// Skip network-backed citation validity checks; syntactically
    /// well-formed citations count as valid.
    pub offline: bool,
}

/// One evaluation dimension: the dataset schemas it reads, the prompts
/// it issues, and the rubric it scores.
#[async_trait]
pub trait Indicator: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// File names the indicator expects inside its dataset directory.
    fn dataset_files(&self) -> &'static [&'static str];

    fn generation(&self) -> GenerationParams {
        GenerationParams::default()
    }

    /// Produce one response record per dataset item, in input order.
    async fn run_inference(&self, provider: &dyn Provider, ctx: &RunContext) -> Result<()>;

    /// Score stored responses against the dataset and aggregate.
    async fn score(&self, ctx: &ScoreContext) -> Result<IndicatorReport>;
}
