//! Knowledge attribution over analytic operations: exact-match math,
//! translation adequacy and summarization faithfulness. Neural adequacy
//! metrics (COMET, BERTScore) stay behind the similarity seam; the
//! built-in scorer is lexical.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use epistemic::extract::clean_output;
use epistemic::metrics::{LexicalSimilarity, Similarity};
use epistemic::Provider;
use serde::{Deserialize, Serialize};

use super::{GenerationParams, Indicator, RunContext, ScoreContext};
use crate::pipeline::{run_prompts, PromptItem};
use crate::records::{load_responses, write_response_files, ResponseRecord};
use crate::register_indicator;
use crate::report::{IndicatorReport, MetricScore};
use crate::{io, thresholds::AttributionThresholds};

pub const MATH_FILE: &str = "math_40.jsonl";
pub const TRANSLATION_FILE: &str = "translation_40.jsonl";
pub const SUMMARIZATION_FILE: &str = "summarization_40.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MathItem {
    id: String,
    question: String,
    gold_answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TranslationItem {
    id: String,
    source_lang: String,
    target_lang: String,
    source_text: String,
    gold_translation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SummarizationItem {
    id: String,
    article: String,
    gold_summary: String,
}

pub struct Attribution {
    similarity: Box<dyn Similarity>,
}

impl Attribution {
    pub fn new() -> Self {
        Self {
            similarity: Box::new(LexicalSimilarity),
        }
    }
}

impl Default for Attribution {
    fn default() -> Self {
        Self::new()
    }
}

struct PartTally {
    total: usize,
    scored: usize,
    rate: Option<f64>,
}

impl Attribution {
    /// Fraction of cleaned outputs exactly equal to the gold answer.
    fn tally_math(
        &self,
        items: &[MathItem],
        responses: &HashMap<usize, ResponseRecord>,
    ) -> PartTally {
        let mut scored = 0usize;
        let mut correct = 0usize;
        for (index, item) in items.iter().enumerate() {
            if let Some(text) = responses.get(&index).and_then(|r| r.response.as_deref()) {
                scored += 1;
                if clean_output(text) == clean_output(&item.gold_answer) {
                    correct += 1;
                }
            }
        }
        PartTally {
            total: items.len(),
            scored,
            rate: (scored > 0).then(|| correct as f64 / scored as f64),
        }
    }

    /// Mean similarity of cleaned outputs against gold translations.
    fn tally_translation(
        &self,
        items: &[TranslationItem],
        responses: &HashMap<usize, ResponseRecord>,
    ) -> PartTally {
        let mut scored = 0usize;
        let mut sum = 0.0f64;
        for (index, item) in items.iter().enumerate() {
            if let Some(text) = responses.get(&index).and_then(|r| r.response.as_deref()) {
                scored += 1;
                sum += self
                    .similarity
                    .score(&clean_output(text), &item.gold_translation);
            }
        }
        PartTally {
            total: items.len(),
            scored,
            rate: (scored > 0).then(|| sum / scored as f64),
        }
    }

    /// Fraction of summaries whose similarity to the gold summary clears
    /// the faithfulness bar.
    fn tally_summarization(
        &self,
        items: &[SummarizationItem],
        responses: &HashMap<usize, ResponseRecord>,
        thresholds: &AttributionThresholds,
    ) -> PartTally {
        let mut scored = 0usize;
        let mut faithful = 0usize;
        for (index, item) in items.iter().enumerate() {
            if let Some(text) = responses.get(&index).and_then(|r| r.response.as_deref()) {
                scored += 1;
                let score = self
                    .similarity
                    .score(&clean_output(text), &clean_output(&item.gold_summary));
                if score >= thresholds.summary_similarity {
                    faithful += 1;
                }
            }
        }
        PartTally {
            total: items.len(),
            scored,
            rate: (scored > 0).then(|| faithful as f64 / scored as f64),
        }
    }
}

fn math_prompt(item: &MathItem) -> PromptItem {
    PromptItem {
        index: 0,
        id: Some(item.id.clone()),
        system: String::new(),
        user: format!(
            "Solve the math problem. Give ONLY the numeric final answer.\n\nProblem: {}",
            item.question
        ),
    }
}

#[async_trait]
impl Indicator for Attribution {
    fn name(&self) -> &'static str {
        "attribution"
    }

    fn description(&self) -> &'static str {
        "Knowledge attribution over math, translation and summarization"
    }

    fn dataset_files(&self) -> &'static [&'static str] {
        &[MATH_FILE, TRANSLATION_FILE, SUMMARIZATION_FILE]
    }

    fn generation(&self) -> GenerationParams {
        GenerationParams {
            temperature: 0.2,
            max_tokens: None,
        }
    }

    async fn run_inference(&self, provider: &dyn Provider, ctx: &RunContext) -> Result<()> {
        let limit = ctx.limit.unwrap_or(usize::MAX);

        let math_path = ctx.dataset_dir.join(MATH_FILE);
        if math_path.exists() {
            let mut items: Vec<MathItem> = io::read_jsonl(&math_path)?;
            items.truncate(limit);
            let prompts: Vec<PromptItem> = items
                .iter()
                .enumerate()
                .map(|(index, item)| PromptItem {
                    index,
                    ..math_prompt(item)
                })
                .collect();
            let records = run_prompts(
                provider,
                &prompts,
                &ctx.work_dir.log_file("math", &ctx.model_label),
            )
            .await?;
            write_response_files(&records, &ctx.work_dir.response_file("math", &ctx.model_label))?;
        } else {
            tracing::warn!("math dataset missing, skipping part: {}", math_path.display());
        }

        let translation_path = ctx.dataset_dir.join(TRANSLATION_FILE);
        if translation_path.exists() {
            let mut items: Vec<TranslationItem> = io::read_jsonl(&translation_path)?;
            items.truncate(limit);
            let prompts: Vec<PromptItem> = items
                .iter()
                .enumerate()
                .map(|(index, item)| PromptItem {
                    index,
                    id: Some(item.id.clone()),
                    system: String::new(),
                    user: format!(
                        "Translate the following text from {} to {}.\n\nText: {}",
                        item.source_lang, item.target_lang, item.source_text
                    ),
                })
                .collect();
            let records = run_prompts(
                provider,
                &prompts,
                &ctx.work_dir.log_file("translation", &ctx.model_label),
            )
            .await?;
            write_response_files(
                &records,
                &ctx.work_dir.response_file("translation", &ctx.model_label),
            )?;
        } else {
            tracing::warn!(
                "translation dataset missing, skipping part: {}",
                translation_path.display()
            );
        }

        let summarization_path = ctx.dataset_dir.join(SUMMARIZATION_FILE);
        if summarization_path.exists() {
            let mut items: Vec<SummarizationItem> = io::read_jsonl(&summarization_path)?;
            items.truncate(limit);
            let prompts: Vec<PromptItem> = items
                .iter()
                .enumerate()
                .map(|(index, item)| PromptItem {
                    index,
                    id: Some(item.id.clone()),
                    system: String::new(),
                    user: format!(
                        "Summarize the following article in 3-5 sentences. Do NOT add extra facts.\n\nArticle:\n{}",
                        item.article
                    ),
                })
                .collect();
            let records = run_prompts(
                provider,
                &prompts,
                &ctx.work_dir.log_file("summarization", &ctx.model_label),
            )
            .await?;
            write_response_files(
                &records,
                &ctx.work_dir.response_file("summarization", &ctx.model_label),
            )?;
        } else {
            tracing::warn!(
                "summarization dataset missing, skipping part: {}",
                summarization_path.display()
            );
        }

        Ok(())
    }

    async fn score(&self, ctx: &ScoreContext) -> Result<IndicatorReport> {
        let thresholds = &ctx.thresholds.attribution;

        let math_path = ctx.dataset_dir.join(MATH_FILE);
        let math = if math_path.exists() {
            let items: Vec<MathItem> = io::read_jsonl(&math_path)?;
            let responses = load_responses(&ctx.work_dir.response_file("math", &ctx.model_label))?;
            self.tally_math(&items, &responses)
        } else {
            tracing::warn!("math dataset missing, metric undefined");
            PartTally {
                total: 0,
                scored: 0,
                rate: None,
            }
        };

        let translation_path = ctx.dataset_dir.join(TRANSLATION_FILE);
        let translation = if translation_path.exists() {
            let items: Vec<TranslationItem> = io::read_jsonl(&translation_path)?;
            let responses =
                load_responses(&ctx.work_dir.response_file("translation", &ctx.model_label))?;
            self.tally_translation(&items, &responses)
        } else {
            tracing::warn!("translation dataset missing, metric undefined");
            PartTally {
                total: 0,
                scored: 0,
                rate: None,
            }
        };

        let summarization_path = ctx.dataset_dir.join(SUMMARIZATION_FILE);
        let summarization = if summarization_path.exists() {
            let items: Vec<SummarizationItem> = io::read_jsonl(&summarization_path)?;
            let responses =
                load_responses(&ctx.work_dir.response_file("summarization", &ctx.model_label))?;
            self.tally_summarization(&items, &responses, thresholds)
        } else {
            tracing::warn!("summarization dataset missing, metric undefined");
            PartTally {
                total: 0,
                scored: 0,
                rate: None,
            }
        };

        let m1 = math
            .rate
            .map_or(0, |r| u8::from(r >= thresholds.math_accuracy));
        let m2 = translation
            .rate
            .map_or(0, |r| u8::from(r >= thresholds.translation_score));
        let m3 = summarization
            .rate
            .map_or(0, |r| u8::from(r >= thresholds.summary_rate));

        let metrics = vec![
            MetricScore::new("math_accuracy", m1, 1, math.rate),
            MetricScore::new("translation_adequacy", m2, 1, translation.rate),
            MetricScore::new("summary_faithfulness", m3, 1, summarization.rate),
        ];

        let available: Vec<f64> = metrics.iter().filter_map(|m| m.rate).collect();
        let overall = if available.is_empty() {
            0.0
        } else {
            available.iter().sum::<f64>() / available.len() as f64
        };

        // A missing part leaves the pass flag undefined rather than failing.
        let parts = [math, translation, summarization];
        let all_present = parts.iter().all(|p| p.rate.is_some());
        let pass = all_present.then(|| m1 == 1 && m2 == 1 && m3 == 1);

        let total_items: usize = parts.iter().map(|p| p.total).sum();
        let scored_items: usize = parts.iter().map(|p| p.scored).sum();

        Ok(IndicatorReport {
            indicator: self.name().to_string(),
            model: ctx.model_label.clone(),
            generated_at: Utc::now(),
            metrics,
            overall,
            pass,
            total_items,
            scored_items,
            skipped_items: total_items - scored_items,
        })
    }
}

register_indicator!("attribution", Attribution);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thresholds::Thresholds;
    use crate::work_dir::RunWorkDir;

    fn ctx(dir: &std::path::Path) -> ScoreContext {
        ScoreContext {
            dataset_dir: dir.join("data"),
            work_dir: RunWorkDir::new(&dir.join("runs"), "attribution").unwrap(),
            model_label: "test-model".to_string(),
            thresholds: Thresholds::default(),
            offline: true,
        }
    }

    #[tokio::test]
    async fn test_math_exact_match_after_cleaning() {
        let dir = tempfile::tempdir().unwrap();
        let dataset_dir = dir.path().join("data");
        std::fs::create_dir_all(&dataset_dir).unwrap();

        let items = vec![
            MathItem {
                id: "M001".to_string(),
                question: "2 + 2?".to_string(),
                gold_answer: "4".to_string(),
            },
            MathItem {
                id: "M002".to_string(),
                question: "10 / 2?".to_string(),
                gold_answer: "5".to_string(),
            },
        ];
        io::write_jsonl(&dataset_dir.join(MATH_FILE), &items).unwrap();

        let ctx = ctx(dir.path());
        let records = vec![
            ResponseRecord::success(
                0,
                Some("M001".into()),
                "<think>2 plus 2</think> 4".to_string(),
                "groq",
                "m",
            ),
            ResponseRecord::success(1, Some("M002".into()), "6".to_string(), "groq", "m"),
        ];
        write_response_files(&records, &ctx.work_dir.response_file("math", "test-model")).unwrap();

        let indicator = Attribution::new();
        let report = indicator.score(&ctx).await.unwrap();

        let math = report.metric("math_accuracy").unwrap();
        assert_eq!(math.rate, Some(0.5));
        assert_eq!(math.points, 0);
        // missing parts leave the pass flag undefined
        assert_eq!(report.pass, None);
    }

    #[tokio::test]
    async fn test_translation_and_summary_similarity() {
        let dir = tempfile::tempdir().unwrap();
        let dataset_dir = dir.path().join("data");
        std::fs::create_dir_all(&dataset_dir).unwrap();

        let translation = vec![TranslationItem {
            id: "T001".to_string(),
            source_lang: "en".to_string(),
            target_lang: "es".to_string(),
            source_text: "The book is on the table.".to_string(),
            gold_translation: "El libro esta sobre la mesa.".to_string(),
        }];
        io::write_jsonl(&dataset_dir.join(TRANSLATION_FILE), &translation).unwrap();

        let summaries = vec![SummarizationItem {
            id: "S001".to_string(),
            article: "A long article about rivers.".to_string(),
            gold_summary: "Rivers carry fresh water to the sea.".to_string(),
        }];
        io::write_jsonl(&dataset_dir.join(SUMMARIZATION_FILE), &summaries).unwrap();

        let ctx = ctx(dir.path());
        write_response_files(
            &[ResponseRecord::success(
                0,
                Some("T001".into()),
                "El libro esta sobre la mesa.".to_string(),
                "groq",
                "m",
            )],
            &ctx.work_dir.response_file("translation", "test-model"),
        )
        .unwrap();
        write_response_files(
            &[ResponseRecord::success(
                0,
                Some("S001".into()),
                "Rivers carry fresh water to the sea.".to_string(),
                "groq",
                "m",
            )],
            &ctx.work_dir.response_file("summarization", "test-model"),
        )
        .unwrap();

        let indicator = Attribution::new();
        let report = indicator.score(&ctx).await.unwrap();

        assert_eq!(report.metric("translation_adequacy").unwrap().rate, Some(1.0));
        assert_eq!(report.metric("translation_adequacy").unwrap().points, 1);
        assert_eq!(report.metric("summary_faithfulness").unwrap().rate, Some(1.0));
        // math dataset missing entirely
        assert_eq!(report.metric("math_accuracy").unwrap().rate, None);
        assert_eq!(report.pass, None);
    }
}
