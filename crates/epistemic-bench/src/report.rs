use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// One rubric metric: the awarded points plus the underlying rate.
/// `rate` is `None` when the metric had no scorable items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricScore {
    pub name: String,
    pub points: u8,
    pub max_points: u8,
    pub rate: Option<f64>,
}

impl MetricScore {
    pub fn new(name: &str, points: u8, max_points: u8, rate: Option<f64>) -> Self {
        Self {
            name: name.to_string(),
            points,
            max_points,
            rate,
        }
    }

    pub fn normalized(&self) -> f64 {
        if self.max_points == 0 {
            0.0
        } else {
            self.points as f64 / self.max_points as f64
        }
    }
}

/// The aggregate report for one (indicator, model) evaluation run.
/// Overwritten whole on re-run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorReport {
    pub indicator: String,
    pub model: String,
    pub generated_at: DateTime<Utc>,
    pub metrics: Vec<MetricScore>,
    pub overall: f64,
    /// `None` for rubrics without a pass/fail flag, or when a required
    /// part was missing.
    pub pass: Option<bool>,
    pub total_items: usize,
    pub scored_items: usize,
    pub skipped_items: usize,
}

impl IndicatorReport {
    pub fn metric(&self, name: &str) -> Option<&MetricScore> {
        self.metrics.iter().find(|m| m.name == name)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn print_summary(&self) {
        println!("\n=== {} / {} ===", self.indicator, self.model);
        for metric in &self.metrics {
            let rate = metric
                .rate
                .map(|r| format!("{:.2}", r))
                .unwrap_or_else(|| "n/a".to_string());
            println!(
                "  {:<24} {}/{} (rate={})",
                metric.name, metric.points, metric.max_points, rate
            );
        }
        println!("  overall: {:.3}", self.overall);
        if let Some(pass) = self.pass {
            println!("  pass:    {}", if pass { "YES" } else { "NO" });
        }
        println!(
            "  items:   {} scored, {} skipped of {}",
            self.scored_items, self.skipped_items, self.total_items
        );
    }
}

/// Award 3/2/1/0 points for a rate where higher is better.
pub fn band_at_least(rate: f64, bands: [f64; 3]) -> u8 {
    if rate >= bands[0] {
        3
    } else if rate >= bands[1] {
        2
    } else if rate >= bands[2] {
        1
    } else {
        0
    }
}

/// Award 3/2/1/0 points for a rate where lower is better.
pub fn band_at_most(rate: f64, bands: [f64; 3]) -> u8 {
    if rate <= bands[0] {
        3
    } else if rate <= bands[1] {
        2
    } else if rate <= bands[2] {
        1
    } else {
        0
    }
}

/// Combine per-model reports for one indicator into a CSV with one row
/// per model: points and rate per metric, then overall and pass.
pub fn write_final_scores(reports: &[IndicatorReport], path: &Path) -> Result<()> {
    if reports.is_empty() {
        return Ok(());
    }

    let mut columns: Vec<Column> = Vec::new();
    columns.push(Column::new(
        "model".into(),
        reports.iter().map(|r| r.model.clone()).collect::<Vec<String>>(),
    ));

    // All reports for one indicator share the same metric list.
    for (i, metric) in reports[0].metrics.iter().enumerate() {
        columns.push(Column::new(
            format!("{}_points", metric.name).into(),
            reports
                .iter()
                .map(|r| r.metrics[i].points as i64)
                .collect::<Vec<i64>>(),
        ));
        columns.push(Column::new(
            format!("{}_rate", metric.name).into(),
            reports
                .iter()
                .map(|r| r.metrics[i].rate)
                .collect::<Vec<Option<f64>>>(),
        ));
    }

    columns.push(Column::new(
        "overall".into(),
        reports.iter().map(|r| r.overall).collect::<Vec<f64>>(),
    ));
    columns.push(Column::new(
        "pass".into(),
        reports.iter().map(|r| r.pass).collect::<Vec<Option<bool>>>(),
    ));

    let mut df = DataFrame::new(columns)?;
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    Ok(())
}
