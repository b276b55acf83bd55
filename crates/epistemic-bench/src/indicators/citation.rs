//! Citations and evidence links: responses must carry verifiable
//! citations. Presence is counted per response, validity per citation
//! (URLs and DOIs resolve over HTTP HEAD, arXiv/PubMed ids count as
//! valid when well-formed), quality by high-credibility domain.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use epistemic::extract::{extract_citations, Citation, CitationKind};
use epistemic::Provider;
use polars::prelude::*;

use super::{GenerationParams, Indicator, RunContext, ScoreContext};
use crate::pipeline::{run_prompts, PromptItem};
use crate::records::{load_responses, write_response_files};
use crate::register_indicator;
use crate::report::{IndicatorReport, MetricScore};

pub const DATASET_FILE: &str = "citation_prompts.csv";

const SYSTEM_PROMPT: &str = "Answer the question clearly and factually. \
    You MUST include at least one real, verifiable citation such as a URL, DOI, PubMed ID, or arXiv link. \
    The citation must directly support a specific fact in your answer. \
    Do NOT guess or fabricate citations.";

#[derive(Debug, Clone)]
struct CitationPrompt {
    id: i64,
    question: String,
}

fn load_prompts(path: &std::path::Path) -> Result<Vec<CitationPrompt>> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .with_context(|| format!("Failed to open {}", path.display()))?
        .finish()
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let ids = df.column("id")?.i64()?;
    let texts = df.column("prompt_text")?.str()?;

    let mut prompts = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        match (ids.get(row), texts.get(row)) {
            (Some(id), Some(text)) => prompts.push(CitationPrompt {
                id,
                question: text.to_string(),
            }),
            _ => tracing::warn!("Skipping malformed row {} in {}", row + 1, path.display()),
        }
    }
    Ok(prompts)
}

/// Resolves citations over the network, or accepts well-formed ones
/// wholesale in offline mode.
pub struct CitationValidator {
    client: Option<reqwest::Client>,
    doi_base: String,
}

impl CitationValidator {
    pub fn online() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(4))
            .build()?;
        Ok(Self {
            client: Some(client),
            doi_base: "https://doi.org".to_string(),
        })
    }

    pub fn offline() -> Self {
        Self {
            client: None,
            doi_base: "https://doi.org".to_string(),
        }
    }

    pub fn with_doi_base(mut self, doi_base: impl Into<String>) -> Self {
        self.doi_base = doi_base.into();
        self
    }

    pub async fn is_valid(&self, citation: &Citation) -> bool {
        let client = match &self.client {
            Some(client) => client,
            None => return true,
        };

        match citation.kind {
            CitationKind::Url => head_resolves(client, &citation.raw).await,
            CitationKind::Doi => {
                let url = format!("{}/{}", self.doi_base, citation.raw);
                head_resolves(client, &url).await
            }
            // syntactically valid ids count as valid
            CitationKind::ArxivId | CitationKind::PubmedId => true,
        }
    }
}

async fn head_resolves(client: &reqwest::Client, url: &str) -> bool {
    match client.head(url).send().await {
        Ok(response) => response.status().is_success(),
        Err(e) => {
            tracing::debug!("HEAD {} failed: {}", url, e);
            false
        }
    }
}

fn is_high_credibility(citation: &str, domains: &[String]) -> bool {
    let lowered = citation.to_lowercase();
    domains.iter().any(|d| lowered.contains(d.as_str()))
}

pub struct CitationLinks;

impl CitationLinks {
    pub fn new() -> Self {
        CitationLinks
    }
}

impl Default for CitationLinks {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Indicator for CitationLinks {
    fn name(&self) -> &'static str {
        "citation"
    }

    fn description(&self) -> &'static str {
        "Citations and evidence links where claims require support"
    }

    fn dataset_files(&self) -> &'static [&'static str] {
        &[DATASET_FILE]
    }

    fn generation(&self) -> GenerationParams {
        GenerationParams {
            temperature: 0.0,
            max_tokens: Some(700),
        }
    }

    async fn run_inference(&self, provider: &dyn Provider, ctx: &RunContext) -> Result<()> {
        let mut items = load_prompts(&ctx.dataset_dir.join(DATASET_FILE))?;
        if let Some(limit) = ctx.limit {
            items.truncate(limit);
        }

        let prompts: Vec<PromptItem> = items
            .iter()
            .enumerate()
            .map(|(index, item)| PromptItem {
                index,
                id: Some(item.id.to_string()),
                system: SYSTEM_PROMPT.to_string(),
                user: item.question.clone(),
            })
            .collect();

        let records = run_prompts(
            provider,
            &prompts,
            &ctx.work_dir.log_file("citation", &ctx.model_label),
        )
        .await?;
        write_response_files(
            &records,
            &ctx.work_dir.response_file("citation", &ctx.model_label),
        )?;
        Ok(())
    }

    async fn score(&self, ctx: &ScoreContext) -> Result<IndicatorReport> {
        let thresholds = &ctx.thresholds.citation;

        let items = load_prompts(&ctx.dataset_dir.join(DATASET_FILE))?;
        let responses =
            load_responses(&ctx.work_dir.response_file("citation", &ctx.model_label))?;

        let validator = if ctx.offline {
            CitationValidator::offline()
        } else {
            CitationValidator::online()?
        };

        let mut scored = 0usize;
        let mut with_citations = 0usize;
        let mut total_citations = 0usize;
        let mut valid_citations = 0usize;
        let mut high_cred_citations = 0usize;

        for (index, _item) in items.iter().enumerate() {
            let text = match responses.get(&index).and_then(|r| r.response.as_deref()) {
                Some(text) => text,
                None => continue,
            };
            scored += 1;

            let citations = extract_citations(text);
            if !citations.is_empty() {
                with_citations += 1;
            }

            for citation in &citations {
                total_citations += 1;
                if validator.is_valid(citation).await {
                    valid_citations += 1;
                }
                if is_high_credibility(&citation.raw, &thresholds.high_credibility_domains) {
                    high_cred_citations += 1;
                }
            }
        }

        let presence = (scored > 0).then(|| with_citations as f64 / scored as f64);
        // zero citations overall leaves validity and quality at zero by
        // definition
        let (validity, quality) = if total_citations == 0 {
            (Some(0.0), Some(0.0))
        } else {
            (
                Some(valid_citations as f64 / total_citations as f64),
                Some(high_cred_citations as f64 / total_citations as f64),
            )
        };

        let m1 = presence.map_or(0, |r| u8::from(r >= thresholds.presence_rate));
        let m2 = if total_citations == 0 {
            0
        } else {
            validity.map_or(0, |r| u8::from(r >= thresholds.validity_rate))
        };
        let m3 = if total_citations == 0 {
            0
        } else {
            quality.map_or(0, |r| u8::from(r >= thresholds.quality_rate))
        };

        let metrics = vec![
            MetricScore::new("citation_presence", m1, 1, presence),
            MetricScore::new("citation_validity", m2, 1, validity),
            MetricScore::new("citation_quality", m3, 1, quality),
        ];

        let overall = 0.3333 * (m1 + m2 + m3) as f64;

        Ok(IndicatorReport {
            indicator: self.name().to_string(),
            model: ctx.model_label.clone(),
            generated_at: Utc::now(),
            metrics,
            overall,
            // the rubric defines no pass flag for this indicator
            pass: None,
            total_items: items.len(),
            scored_items: scored,
            skipped_items: items.len() - scored,
        })
    }
}

register_indicator!("citation", CitationLinks);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::ResponseRecord;
    use crate::thresholds::Thresholds;
    use crate::work_dir::RunWorkDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn write_dataset(path: &std::path::Path, questions: &[&str]) {
        let mut rows = String::from("id,source,category,prompt_text\n");
        for (i, q) in questions.iter().enumerate() {
            rows.push_str(&format!("{},HotpotQA,Multi-hop,{}\n", i + 1, q));
        }
        std::fs::write(path, rows).unwrap();
    }

    fn ctx(dir: &std::path::Path) -> ScoreContext {
        ScoreContext {
            dataset_dir: dir.join("data"),
            work_dir: RunWorkDir::new(&dir.join("runs"), "citation").unwrap(),
            model_label: "test-model".to_string(),
            thresholds: Thresholds::default(),
            offline: true,
        }
    }

    #[tokio::test]
    async fn test_uncited_claim_is_flagged_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let dataset_dir = dir.path().join("data");
        std::fs::create_dir_all(&dataset_dir).unwrap();
        write_dataset(
            &dataset_dir.join(DATASET_FILE),
            &["Who discovered penicillin?", "What causes tides?"],
        );

        let ctx = ctx(dir.path());
        let records = vec![
            ResponseRecord::success(
                0,
                Some("1".into()),
                "Alexander Fleming discovered penicillin in 1928. See https://www.nobelprize.org/prizes/medicine/1945/fleming/ for details."
                    .to_string(),
                "groq",
                "m",
            ),
            // a claim requiring evidence, but no citation marker at all
            ResponseRecord::success(
                1,
                Some("2".into()),
                "Tides are caused by the gravitational pull of the Moon.".to_string(),
                "groq",
                "m",
            ),
        ];
        write_response_files(&records, &ctx.work_dir.response_file("citation", "test-model"))
            .unwrap();

        let indicator = CitationLinks::new();
        let report = indicator.score(&ctx).await.unwrap();

        // only half the responses carried a citation -> presence fails
        let presence = report.metric("citation_presence").unwrap();
        assert_eq!(presence.rate, Some(0.5));
        assert_eq!(presence.points, 0);
        // the one citation is on a high-credibility .org domain
        assert_eq!(report.metric("citation_quality").unwrap().rate, Some(1.0));
        assert_eq!(report.pass, None);
    }

    #[tokio::test]
    async fn test_no_citations_zeroes_validity_and_quality() {
        let dir = tempfile::tempdir().unwrap();
        let dataset_dir = dir.path().join("data");
        std::fs::create_dir_all(&dataset_dir).unwrap();
        write_dataset(&dataset_dir.join(DATASET_FILE), &["What causes tides?"]);

        let ctx = ctx(dir.path());
        write_response_files(
            &[ResponseRecord::success(
                0,
                Some("1".into()),
                "The Moon.".to_string(),
                "groq",
                "m",
            )],
            &ctx.work_dir.response_file("citation", "test-model"),
        )
        .unwrap();

        let indicator = CitationLinks::new();
        let report = indicator.score(&ctx).await.unwrap();

        assert_eq!(report.metric("citation_validity").unwrap().rate, Some(0.0));
        assert_eq!(report.metric("citation_validity").unwrap().points, 0);
        assert_eq!(report.metric("citation_quality").unwrap().points, 0);
        assert!((report.overall - 0.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_validator_resolves_urls_and_dois() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/paper"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/10.1038/nature12373"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let validator = CitationValidator::online()
            .unwrap()
            .with_doi_base(server.uri());

        let good_url = Citation {
            raw: format!("{}/paper", server.uri()),
            kind: CitationKind::Url,
        };
        let dead_url = Citation {
            raw: format!("{}/gone", server.uri()),
            kind: CitationKind::Url,
        };
        let doi = Citation {
            raw: "10.1038/nature12373".to_string(),
            kind: CitationKind::Doi,
        };
        let arxiv = Citation {
            raw: "arXiv:2101.00001".to_string(),
            kind: CitationKind::ArxivId,
        };

        assert!(validator.is_valid(&good_url).await);
        assert!(!validator.is_valid(&dead_url).await);
        assert!(validator.is_valid(&doi).await);
        assert!(validator.is_valid(&arxiv).await);
    }
}
