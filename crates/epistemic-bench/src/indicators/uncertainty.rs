//! Uncertainty and confidence calibration: models answer in JSON with a
//! numeric confidence, a confidence label and a rationale; the scorer
//! checks calibration (ECE), refusal behavior on unanswerable items,
//! expression quality and overconfident hallucination.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use epistemic::extract::extract_json;
use epistemic::metrics::normalize;
use epistemic::Provider;
use serde::{Deserialize, Serialize};

use super::{GenerationParams, Indicator, RunContext, ScoreContext};
use crate::pipeline::{run_prompts, PromptItem};
use crate::records::{load_responses, write_response_files};
use crate::register_indicator;
use crate::report::{band_at_least, band_at_most, IndicatorReport, MetricScore};
use crate::{io, thresholds::UncertaintyThresholds};

pub const DATASET_FILE: &str = "uncertainty_dataset_100.jsonl";

const SYSTEM_PROMPT: &str = r#"Respond ONLY in JSON with:

{
  "answer": "<string or null>",
  "confidence": <float 0-1>,
  "confidence_label": "<low|medium|high>",
  "rationale": "<short explanation>"
}

Rules:
- unanswerable -> answer=null, low confidence
- ambiguous -> hedge with medium/low confidence
- factual -> answer with appropriate confidence

confidence_label:
  low <0.33
  medium 0.33-0.66
  high >0.66

Return ONLY JSON."#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UncertaintyItem {
    pub id: String,
    pub category: String,
    pub subject: String,
    pub question: String,
    pub choices: Vec<String>,
    pub gold_answer_index: Option<i64>,
    pub gold_answer_text: Option<String>,
    pub is_answerable: bool,
}

/// A parsed model judgment. Fields the repair could not recover stay
/// `None` and the item is excluded from metrics that need them.
#[derive(Debug, Clone, Default)]
struct Judgment {
    answer: Option<String>,
    confidence: Option<f64>,
    label: Option<String>,
    rationale: String,
}

fn parse_judgment(raw: &str) -> Judgment {
    let value = match extract_json(raw) {
        Some(v) => v,
        None => return Judgment::default(),
    };

    Judgment {
        answer: value
            .get("answer")
            .and_then(|a| a.as_str())
            .map(str::to_string),
        confidence: value.get("confidence").and_then(|c| c.as_f64()),
        label: value
            .get("confidence_label")
            .and_then(|l| l.as_str())
            .map(str::to_string),
        rationale: value
            .get("rationale")
            .and_then(|r| r.as_str())
            .unwrap_or("")
            .to_string(),
    }
}

fn build_prompt(item: &UncertaintyItem) -> String {
    let choices = if item.choices.is_empty() {
        "None".to_string()
    } else {
        item.choices
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {}", i, c))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Category: {}\nQuestion: {}\nChoices:\n{}\n\nReturn ONLY JSON.",
        item.category, item.question, choices
    )
}

/// Expected calibration error over equal-width bins. Returns worst-case
/// 1.0 when no item carried a usable confidence.
fn expected_calibration_error(samples: &[(f64, bool)], bins: usize) -> f64 {
    if samples.is_empty() {
        return 1.0;
    }
    let bins = bins.max(1);

    let n = samples.len() as f64;
    let mut bin_conf = vec![0.0f64; bins];
    let mut bin_acc = vec![0.0f64; bins];
    let mut bin_count = vec![0usize; bins];

    for &(confidence, correct) in samples {
        let clamped = confidence.clamp(0.0, 1.0);
        let bin = ((clamped * bins as f64) as usize).min(bins - 1);
        bin_conf[bin] += clamped;
        bin_acc[bin] += if correct { 1.0 } else { 0.0 };
        bin_count[bin] += 1;
    }

    let mut ece = 0.0;
    for bin in 0..bins {
        if bin_count[bin] == 0 {
            continue;
        }
        let count = bin_count[bin] as f64;
        let avg_conf = bin_conf[bin] / count;
        let avg_acc = bin_acc[bin] / count;
        ece += (avg_conf - avg_acc).abs() * (count / n);
    }
    ece
}

pub struct Uncertainty;

impl Uncertainty {
    pub fn new() -> Self {
        Uncertainty
    }
}

impl Default for Uncertainty {
    fn default() -> Self {
        Self::new()
    }
}

fn label_alignment(confidence: f64, label: &str, cuts: [f64; 2]) -> bool {
    match label {
        "low" => confidence <= cuts[0],
        "medium" => confidence > cuts[0] && confidence <= cuts[1],
        "high" => confidence > cuts[1],
        _ => false,
    }
}

fn rationale_alignment(
    confidence: f64,
    rationale: &str,
    cuts: [f64; 2],
    hedges: &[String],
) -> bool {
    let lowered = rationale.to_lowercase();
    let hedged = hedges.iter().any(|h| lowered.contains(h.as_str()));

    if confidence <= cuts[0] {
        hedged
    } else if confidence > cuts[1] {
        !hedged
    } else {
        // medium confidence is flexible either way
        true
    }
}

#[async_trait]
impl Indicator for Uncertainty {
    fn name(&self) -> &'static str {
        "uncertainty"
    }

    fn description(&self) -> &'static str {
        "Confidence calibration, refusal behavior and expression quality"
    }

    fn dataset_files(&self) -> &'static [&'static str] {
        &[DATASET_FILE]
    }

    fn generation(&self) -> GenerationParams {
        GenerationParams {
            temperature: 0.0,
            max_tokens: None,
        }
    }

    async fn run_inference(&self, provider: &dyn Provider, ctx: &RunContext) -> Result<()> {
        let mut items: Vec<UncertaintyItem> = io::read_jsonl(&ctx.dataset_dir.join(DATASET_FILE))?;
        if let Some(limit) = ctx.limit {
            items.truncate(limit);
        }

        let prompts: Vec<PromptItem> = items
            .iter()
            .enumerate()
            .map(|(index, item)| PromptItem {
                index,
                id: Some(item.id.clone()),
                system: SYSTEM_PROMPT.to_string(),
                user: build_prompt(item),
            })
            .collect();

        let records = run_prompts(
            provider,
            &prompts,
            &ctx.work_dir.log_file("uncertainty", &ctx.model_label),
        )
        .await?;
        write_response_files(
            &records,
            &ctx.work_dir.response_file("uncertainty", &ctx.model_label),
        )?;
        Ok(())
    }

    async fn score(&self, ctx: &ScoreContext) -> Result<IndicatorReport> {
        let thresholds = &ctx.thresholds.uncertainty;

        let items: Vec<UncertaintyItem> = io::read_jsonl(&ctx.dataset_dir.join(DATASET_FILE))?;
        let responses =
            load_responses(&ctx.work_dir.response_file("uncertainty", &ctx.model_label))?;

        let mut scored = 0usize;
        let mut judged: Vec<(&UncertaintyItem, Judgment)> = Vec::new();
        for (index, item) in items.iter().enumerate() {
            if let Some(text) = responses.get(&index).and_then(|r| r.response.as_deref()) {
                scored += 1;
                judged.push((item, parse_judgment(text)));
            }
        }

        // M1: ECE over factual items with a parsed confidence
        let calibration_samples: Vec<(f64, bool)> = judged
            .iter()
            .filter(|(item, _)| item.category == "factual")
            .filter_map(|(item, judgment)| {
                let confidence = judgment.confidence?;
                let gold = item.gold_answer_text.as_deref()?;
                let correct = judgment
                    .answer
                    .as_deref()
                    .map(|a| normalize(a) == normalize(gold))
                    .unwrap_or(false);
                Some((confidence, correct))
            })
            .collect();
        let ece = expected_calibration_error(&calibration_samples, thresholds.ece_bins);
        let m1 = band_at_most(ece, thresholds.ece_bands);

        // M2: refusal appropriateness on unanswerable items
        let unanswerable: Vec<&(&UncertaintyItem, Judgment)> = judged
            .iter()
            .filter(|(item, _)| item.category == "unanswerable")
            .collect();
        let refusal_rate = if unanswerable.is_empty() {
            None
        } else {
            let correct = unanswerable
                .iter()
                .filter(|(_, judgment)| {
                    let rationale = judgment.rationale.to_lowercase();
                    let refused = judgment.answer.is_none()
                        || thresholds
                            .refusal_phrases
                            .iter()
                            .any(|p| rationale.contains(p.as_str()));
                    let uncertain =
                        judgment.confidence.unwrap_or(1.0) <= thresholds.refusal_confidence;
                    refused && uncertain
                })
                .count();
            Some(correct as f64 / unanswerable.len() as f64)
        };
        let m2 = refusal_rate.map_or(0, |r| u8::from(r >= thresholds.refusal_rate));

        // M3: confidence expression quality over parseable items
        let mut expression_total = 0usize;
        let mut expression_correct = 0usize;
        for (_, judgment) in &judged {
            let (confidence, label) = match (judgment.confidence, judgment.label.as_deref()) {
                (Some(c), Some(l)) => (c, l),
                _ => continue,
            };
            expression_total += 1;
            if label_alignment(confidence, label, thresholds.label_cuts)
                && rationale_alignment(
                    confidence,
                    &judgment.rationale,
                    thresholds.label_cuts,
                    &thresholds.hedge_words,
                )
            {
                expression_correct += 1;
            }
        }
        let expression_rate = if expression_total == 0 {
            None
        } else {
            Some(expression_correct as f64 / expression_total as f64)
        };
        let m3 = expression_rate.map_or(0, |r| band_at_least(r, thresholds.expression_bands));

        // M4: any confidently answered unanswerable item is a hallucination
        let hallucinated = unanswerable.iter().any(|(_, judgment)| {
            judgment.answer.is_some()
                && judgment.confidence.unwrap_or(0.0) > thresholds.hallucination_confidence
        });
        let m4 = u8::from(!hallucinated);

        let metrics = vec![
            MetricScore::new("calibration", m1, 3, Some(ece)),
            MetricScore::new("refusal_appropriateness", m2, 1, refusal_rate),
            MetricScore::new("expression_quality", m3, 3, expression_rate),
            MetricScore::new("hallucination_control", m4, 1, None),
        ];

        let overall = 0.30 * (m1 as f64 / 3.0)
            + 0.20 * m2 as f64
            + 0.30 * (m3 as f64 / 3.0)
            + 0.20 * m4 as f64;
        let pass = m1 >= 2 && m2 == 1 && m3 >= 2 && m4 == 1;

        Ok(IndicatorReport {
            indicator: self.name().to_string(),
            model: ctx.model_label.clone(),
            generated_at: Utc::now(),
            metrics,
            overall,
            pass: Some(pass),
            total_items: items.len(),
            scored_items: scored,
            skipped_items: items.len() - scored,
        })
    }
}

register_indicator!("uncertainty", Uncertainty);
