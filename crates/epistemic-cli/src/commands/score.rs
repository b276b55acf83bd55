use std::path::Path;

use anyhow::{Context, Result};
use epistemic_bench::report::write_final_scores;
use epistemic_bench::{IndicatorSet, RunWorkDir, ScoreContext, Thresholds};

pub async fn handle_score(
    selector: &str,
    dataset: &Path,
    models: &[String],
    work_dir_root: &Path,
    thresholds_path: Option<&Path>,
    offline: bool,
) -> Result<()> {
    let indicator = IndicatorSet::from(selector)
        .with_context(|| format!("unknown indicator '{}', try `epistemic list`", selector))?;

    let thresholds = match thresholds_path {
        Some(path) => Thresholds::load(path)?,
        None => Thresholds::default(),
    };

    let work_dir = RunWorkDir::new(work_dir_root, indicator.name())?;

    let mut reports = Vec::with_capacity(models.len());
    for label in models {
        let ctx = ScoreContext {
            dataset_dir: dataset.to_path_buf(),
            work_dir: work_dir.clone(),
            model_label: label.clone(),
            thresholds: thresholds.clone(),
            offline,
        };

        let report = indicator
            .score(&ctx)
            .await
            .with_context(|| format!("failed to score model '{}'", label))?;

        report.write(&work_dir.score_file(indicator.name(), label))?;
        report.print_summary();
        reports.push(report);
    }

    write_final_scores(&reports, &work_dir.final_scores_file())?;
    println!(
        "\nScores saved under {}",
        work_dir.base_path().join("scores").display()
    );

    Ok(())
}
