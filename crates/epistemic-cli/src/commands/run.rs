use std::path::Path;

use anyhow::{ensure, Context, Result};
use epistemic::ModelConfig;
use epistemic_bench::{IndicatorSet, RunContext, RunWorkDir};

/// One `--model` selection: `[label=]provider/model-id`. The label names
/// the output files; it defaults to the model id with path separators
/// flattened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub label: String,
    pub provider: String,
    pub model_id: String,
}

pub fn parse_model_selection(raw: &str) -> Result<ModelSelection> {
    let (label, rest) = match raw.split_once('=') {
        Some((label, rest)) => (Some(label.to_string()), rest),
        None => (None, raw),
    };

    let (provider, model_id) = rest
        .split_once('/')
        .with_context(|| format!("expected [label=]provider/model-id, got '{}'", raw))?;
    ensure!(
        !provider.is_empty() && !model_id.is_empty(),
        "expected [label=]provider/model-id, got '{}'",
        raw
    );

    Ok(ModelSelection {
        label: label.unwrap_or_else(|| model_id.replace('/', "-")),
        provider: provider.to_string(),
        model_id: model_id.to_string(),
    })
}

pub async fn handle_run(
    selector: &str,
    dataset: &Path,
    models: &[String],
    work_dir_root: &Path,
    limit: Option<usize>,
) -> Result<()> {
    let indicator = IndicatorSet::from(selector)
        .with_context(|| format!("unknown indicator '{}', try `epistemic list`", selector))?;

    let selections = models
        .iter()
        .map(|raw| parse_model_selection(raw))
        .collect::<Result<Vec<_>>>()?;

    let work_dir = RunWorkDir::new(work_dir_root, indicator.name())?;

    // construct every provider up front: credentials are read at start
    // and a missing key fails the run before any request is issued
    let params = indicator.generation();
    let mut providers = Vec::with_capacity(selections.len());
    for selection in &selections {
        let mut model = ModelConfig::new(&selection.model_id);
        model.temperature = Some(params.temperature);
        model.max_tokens = params.max_tokens;

        let provider = epistemic::providers::create(&selection.provider, model)
            .with_context(|| format!("failed to initialize provider '{}'", selection.provider))?;
        providers.push(provider);
    }

    for (selection, provider) in selections.iter().zip(&providers) {
        println!(
            "\n=== Running {} on {}/{} ===",
            indicator.name(),
            selection.provider,
            selection.model_id
        );

        let ctx = RunContext {
            dataset_dir: dataset.to_path_buf(),
            work_dir: work_dir.clone(),
            model_label: selection.label.clone(),
            limit,
        };
        indicator.run_inference(provider.as_ref(), &ctx).await?;

        println!("Responses saved under {}", work_dir.base_path().display());
    }

    Ok(())
}
