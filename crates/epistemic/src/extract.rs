//! Text salvage helpers: JSON repair for models told to answer in JSON,
//! citation extraction, and cleanup of reasoning/markup artifacts.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static JSON_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());
static THINK_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());
static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s\])]+").unwrap());
static DOI_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b10\.\d{4,9}/[-._;()/:A-Za-z0-9]+\b").unwrap());
static ARXIV_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"arXiv:\d{4}\.\d{4,5}").unwrap());
static PUBMED_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"PMID:\s*\d+").unwrap());

/// Extract a JSON object from model output that may carry markdown
/// fences or surrounding prose. `None` means the item is unparseable and
/// gets excluded from metrics that need its fields.
pub fn extract_json(text: &str) -> Option<Value> {
    let stripped = text.replace("```json", "").replace("```", "");
    let candidate = JSON_BLOCK.find(stripped.trim())?;
    serde_json::from_str(candidate.as_str()).ok()
}

/// Strip `<think>` reasoning blocks and leftover markup, collapse runs
/// of whitespace.
pub fn clean_output(text: &str) -> String {
    let no_think = THINK_BLOCK.replace_all(text, "");
    let no_tags = MARKUP_TAG.replace_all(&no_think, "");
    WHITESPACE.replace_all(&no_tags, " ").trim().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationKind {
    Url,
    Doi,
    ArxivId,
    PubmedId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub raw: String,
    pub kind: CitationKind,
}

/// Extract URLs, DOIs, arXiv ids and PubMed ids from text, in the order
/// the patterns match.
pub fn extract_citations(text: &str) -> Vec<Citation> {
    let mut citations = Vec::new();
    for m in URL_PATTERN.find_iter(text) {
        citations.push(Citation {
            raw: m.as_str().to_string(),
            kind: CitationKind::Url,
        });
    }
    for m in DOI_PATTERN.find_iter(text) {
        citations.push(Citation {
            raw: m.as_str().to_string(),
            kind: CitationKind::Doi,
        });
    }
    for m in ARXIV_PATTERN.find_iter(text) {
        citations.push(Citation {
            raw: m.as_str().to_string(),
            kind: CitationKind::ArxivId,
        });
    }
    for m in PUBMED_PATTERN.find_iter(text) {
        citations.push(Citation {
            raw: m.as_str().to_string(),
            kind: CitationKind::PubmedId,
        });
    }
    citations
}
