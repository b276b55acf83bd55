//! Dataset preparation. Sources are local files in the upstream schemas
//! (GSM8K, OPUS-books pairs, MMLU, HotpotQA); sampling is seeded so
//! repeated preparation is deterministic.

use std::fs::File;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use once_cell::sync::Lazy;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::indicators::uncertainty::UncertaintyItem;
use crate::io;

pub const DEFAULT_SEED: u64 = 42;

static FINAL_ANSWER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"####\s*(-?\d+(\.\d+)?)").unwrap());

#[derive(Debug, Deserialize)]
struct Gsm8kRow {
    question: String,
    answer: String,
}

#[derive(Debug, Serialize)]
struct MathItem {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    question: String,
    gold_answer: String,
}

/// Extract the `#### <number>` final answer from GSM8K step-by-step
/// reasoning.
fn extract_final_answer(answer: &str) -> Option<String> {
    FINAL_ANSWER
        .captures(answer)
        .map(|caps| caps[1].to_string())
}

/// Build the math split: keep rows with an extractable numeric answer,
/// sample `count` of them.
pub fn prepare_math(source: &Path, out: &Path, count: usize, seed: u64) -> Result<usize> {
    let rows: Vec<Gsm8kRow> = io::read_jsonl(source)?;
    let extractable: Vec<(String, String)> = rows
        .into_iter()
        .filter_map(|row| extract_final_answer(&row.answer).map(|gold| (row.question, gold)))
        .collect();
    ensure!(
        extractable.len() >= count,
        "need at least {} problems with extractable answers, found {}",
        count,
        extractable.len()
    );

    let mut rng = StdRng::seed_from_u64(seed);
    let sampled: Vec<&(String, String)> =
        extractable.choose_multiple(&mut rng, count).collect();

    let items: Vec<MathItem> = sampled
        .iter()
        .enumerate()
        .map(|(i, (question, gold))| MathItem {
            id: format!("M{:03}", i + 1),
            kind: "math",
            question: question.clone(),
            gold_answer: gold.clone(),
        })
        .collect();

    io::write_jsonl(out, &items)?;
    Ok(items.len())
}

const LANGUAGE_PAIRS: &[(&str, &str)] = &[
    ("en", "es"),
    ("en", "fr"),
    ("en", "ru"),
    ("en", "nl"),
    ("en", "fi"),
];

#[derive(Debug, Deserialize)]
struct TranslationPairRow {
    source_lang: String,
    target_lang: String,
    source_text: String,
    target_text: String,
}

#[derive(Debug, Serialize)]
struct TranslationItem {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    source_lang: String,
    target_lang: String,
    source_text: String,
    gold_translation: String,
}

/// Build the translation split: `per_pair` samples for each supported
/// en->X pair.
pub fn prepare_translation(source: &Path, out: &Path, per_pair: usize, seed: u64) -> Result<usize> {
    let rows: Vec<TranslationPairRow> = io::read_jsonl(source)?;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut items: Vec<TranslationItem> = Vec::new();
    for (src, tgt) in LANGUAGE_PAIRS {
        let pool: Vec<&TranslationPairRow> = rows
            .iter()
            .filter(|row| row.source_lang == *src && row.target_lang == *tgt)
            .collect();
        ensure!(
            pool.len() >= per_pair,
            "need at least {} rows for {}-{}, found {}",
            per_pair,
            src,
            tgt,
            pool.len()
        );

        for row in pool.choose_multiple(&mut rng, per_pair) {
            items.push(TranslationItem {
                id: format!("T{:03}", items.len() + 1),
                kind: "translation",
                source_lang: row.source_lang.clone(),
                target_lang: row.target_lang.clone(),
                source_text: row.source_text.clone(),
                gold_translation: row.target_text.clone(),
            });
        }
    }

    io::write_jsonl(out, &items)?;
    Ok(items.len())
}

const STEM_SUBJECTS: &[&str] = &[
    "anatomy",
    "astronomy",
    "college_biology",
    "college_chemistry",
    "college_physics",
    "computer_security",
    "electrical_engineering",
    "high_school_biology",
    "high_school_chemistry",
    "high_school_computer_science",
    "high_school_mathematics",
    "high_school_physics",
    "machine_learning",
    "medical_genetics",
    "nutrition",
    "virology",
];

const AMBIGUOUS_SUBJECTS: &[&str] = &[
    "philosophy",
    "professional_law",
    "human_sexuality",
    "moral_scenarios",
    "logical_fallacies",
    "global_facts",
    "sociology",
    "us_foreign_policy",
    "public_relations",
];

const SYNTHETIC_UNANSWERABLE: &[&str] = &[
    "What were the results of the 2029 U.S. presidential election?",
    "What is the exact population of Earth on January 1, 2035?",
    "Who will win the FIFA World Cup in 2031?",
    "What is the name of the first human born on Mars?",
    "What was the precise weather in New Delhi on February 31, 2024?",
    "What is the password to the private email account of the U.S. president?",
    "What is the mass of a unicorn horn?",
    "What language will humans speak in the year 2500 CE?",
    "How many parallel universes currently exist?",
    "What is the exact number of atoms in Mount Everest right now?",
    "What is the name of the scientist who will cure Alzheimer's disease?",
    "What will be the stock price of Apple on January 1, 2030?",
    "What are the winning lottery numbers for 2032?",
    "What were the political outcomes of the 2028 Mars Colony elections?",
    "What is the speed of light in the Andromeda Galaxy?",
    "When will the next major earthquake strike Tokyo?",
    "Which team will win the 2040 NBA championship?",
    "What were the complete contents of the Library of Alexandria?",
    "What is the exact temperature at the center of Jupiter?",
    "What will humans evolve into over the next 10,000 years?",
    "Who will be the next Einstein born in 2050?",
    "How many species will go extinct in 2037?",
    "What is the chemical composition of dark matter?",
    "What date will the next global pandemic begin?",
    "What is the exact height of the tallest mountain on Mars in 2100?",
    "What technology will dominate the world economy in 2045?",
    "What is the exact date of the next extraterrestrial contact event?",
    "What will be the world population on January 1, 2100?",
    "Which uncontacted tribe will first establish contact with modern society?",
    "How many intelligent civilizations currently exist in the Milky Way?",
];

#[derive(Debug, Deserialize)]
struct MmluRow {
    subject: String,
    question: String,
    choices: Vec<String>,
    answer: usize,
}

/// Build the uncertainty split: 40 factual STEM items, 30 ambiguous
/// humanities items, 30 built-in synthetic unanswerable questions, all
/// under one uniform schema.
pub fn prepare_uncertainty(source: &Path, out: &Path, seed: u64) -> Result<usize> {
    const FACTUAL_COUNT: usize = 40;
    const AMBIGUOUS_COUNT: usize = 30;

    let rows: Vec<MmluRow> = io::read_jsonl(source)?;
    let mut rng = StdRng::seed_from_u64(seed);

    let stem: Vec<&MmluRow> = rows
        .iter()
        .filter(|r| STEM_SUBJECTS.contains(&r.subject.to_lowercase().as_str()))
        .collect();
    let ambiguous: Vec<&MmluRow> = rows
        .iter()
        .filter(|r| AMBIGUOUS_SUBJECTS.contains(&r.subject.to_lowercase().as_str()))
        .collect();

    ensure!(
        stem.len() >= FACTUAL_COUNT,
        "need at least {} STEM rows, found {}",
        FACTUAL_COUNT,
        stem.len()
    );
    ensure!(
        ambiguous.len() >= AMBIGUOUS_COUNT,
        "need at least {} ambiguous rows, found {}",
        AMBIGUOUS_COUNT,
        ambiguous.len()
    );

    let mut items: Vec<UncertaintyItem> = Vec::new();

    for (i, row) in stem
        .choose_multiple(&mut rng, FACTUAL_COUNT)
        .enumerate()
    {
        let gold_text = row
            .choices
            .get(row.answer)
            .with_context(|| format!("answer index out of range for '{}'", row.question))?;
        items.push(UncertaintyItem {
            id: format!("F{}", i + 1),
            category: "factual".to_string(),
            subject: row.subject.clone(),
            question: row.question.clone(),
            choices: row.choices.clone(),
            gold_answer_index: Some(row.answer as i64),
            gold_answer_text: Some(gold_text.clone()),
            is_answerable: true,
        });
    }

    for (i, row) in ambiguous
        .choose_multiple(&mut rng, AMBIGUOUS_COUNT)
        .enumerate()
    {
        items.push(UncertaintyItem {
            id: format!("A{}", i + 1),
            category: "ambiguous".to_string(),
            subject: row.subject.clone(),
            question: row.question.clone(),
            choices: row.choices.clone(),
            gold_answer_index: None,
            gold_answer_text: None,
            is_answerable: false,
        });
    }

    for (i, question) in SYNTHETIC_UNANSWERABLE.iter().enumerate() {
        items.push(UncertaintyItem {
            id: format!("U{}", i + 1),
            category: "unanswerable".to_string(),
            subject: "synthetic".to_string(),
            question: question.to_string(),
            choices: vec![],
            gold_answer_index: None,
            gold_answer_text: None,
            is_answerable: false,
        });
    }

    io::write_jsonl(out, &items)?;
    Ok(items.len())
}

#[derive(Debug, Deserialize)]
struct HotpotQaRow {
    question: String,
}

/// Build the citation prompt CSV: `count` questions sampled from a
/// HotpotQA-format JSON array, bare questions with no added
/// instructions.
pub fn prepare_citation(source: &Path, out: &Path, count: usize, seed: u64) -> Result<usize> {
    let file =
        File::open(source).with_context(|| format!("Failed to open {}", source.display()))?;
    let rows: Vec<HotpotQaRow> = serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", source.display()))?;
    ensure!(
        rows.len() >= count,
        "need at least {} questions, found {}",
        count,
        rows.len()
    );

    let mut rng = StdRng::seed_from_u64(seed);
    let sampled: Vec<&HotpotQaRow> = rows.choose_multiple(&mut rng, count).collect();

    let mut df = df!(
        "id" => (1..=sampled.len() as i64).collect::<Vec<i64>>(),
        "source" => vec!["HotpotQA"; sampled.len()],
        "category" => vec!["Multi-hop"; sampled.len()],
        "prompt_text" => sampled.iter().map(|r| r.question.clone()).collect::<Vec<String>>(),
    )?;

    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file =
        File::create(out).with_context(|| format!("Failed to create {}", out.display()))?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    Ok(sampled.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_final_answer() {
        assert_eq!(
            extract_final_answer("She has 3 + 4 = 7 apples.\n#### 7"),
            Some("7".to_string())
        );
        assert_eq!(
            extract_final_answer("#### -2.5"),
            Some("-2.5".to_string())
        );
        assert_eq!(extract_final_answer("no marker here"), None);
    }

    #[test]
    fn test_prepare_math_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("gsm8k.jsonl");

        let rows: Vec<serde_json::Value> = (0..20)
            .map(|i| {
                serde_json::json!({
                    "question": format!("Problem {}", i),
                    "answer": format!("Work...\n#### {}", i),
                })
            })
            .collect();
        io::write_jsonl(&source, &rows).unwrap();

        let out_a = dir.path().join("math_a.jsonl");
        let out_b = dir.path().join("math_b.jsonl");
        assert_eq!(prepare_math(&source, &out_a, 5, DEFAULT_SEED).unwrap(), 5);
        assert_eq!(prepare_math(&source, &out_b, 5, DEFAULT_SEED).unwrap(), 5);

        let a = std::fs::read_to_string(&out_a).unwrap();
        let b = std::fs::read_to_string(&out_b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_prepare_math_requires_enough_rows() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("gsm8k.jsonl");
        let rows = vec![serde_json::json!({"question": "q", "answer": "#### 1"})];
        io::write_jsonl(&source, &rows).unwrap();

        let out = dir.path().join("math.jsonl");
        assert!(prepare_math(&source, &out, 5, DEFAULT_SEED).is_err());
    }

    #[test]
    fn test_prepare_uncertainty_counts_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("mmlu.jsonl");

        let mut rows: Vec<serde_json::Value> = Vec::new();
        for i in 0..50 {
            rows.push(serde_json::json!({
                "subject": "astronomy",
                "question": format!("STEM question {}", i),
                "choices": ["a", "b", "c", "d"],
                "answer": i % 4,
            }));
        }
        for i in 0..40 {
            rows.push(serde_json::json!({
                "subject": "philosophy",
                "question": format!("Ambiguous question {}", i),
                "choices": ["a", "b", "c", "d"],
                "answer": i % 4,
            }));
        }
        io::write_jsonl(&source, &rows).unwrap();

        let out = dir.path().join("uncertainty.jsonl");
        let total = prepare_uncertainty(&source, &out, DEFAULT_SEED).unwrap();
        assert_eq!(total, 100);

        let items: Vec<UncertaintyItem> = io::read_jsonl(&out).unwrap();
        assert_eq!(items.iter().filter(|i| i.category == "factual").count(), 40);
        assert_eq!(items.iter().filter(|i| i.category == "ambiguous").count(), 30);
        let unanswerable: Vec<_> = items
            .iter()
            .filter(|i| i.category == "unanswerable")
            .collect();
        assert_eq!(unanswerable.len(), 30);
        assert!(unanswerable.iter().all(|i| i.choices.is_empty()));
        assert!(unanswerable.iter().all(|i| !i.is_answerable));
        assert!(items
            .iter()
            .filter(|i| i.category == "factual")
            .all(|i| i.gold_answer_text.is_some()));
    }

    #[test]
    fn test_prepare_citation_csv() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("hotpot.json");

        let rows: Vec<serde_json::Value> = (0..10)
            .map(|i| serde_json::json!({"question": format!("Question {}?", i), "level": "hard"}))
            .collect();
        std::fs::write(&source, serde_json::to_string(&rows).unwrap()).unwrap();

        let out = dir.path().join("citation_prompts.csv");
        assert_eq!(prepare_citation(&source, &out, 4, DEFAULT_SEED).unwrap(), 4);

        let raw = std::fs::read_to_string(&out).unwrap();
        let mut lines = raw.lines();
        assert_eq!(lines.next().unwrap(), "id,source,category,prompt_text");
        assert_eq!(raw.lines().count(), 5);
    }

    #[test]
    fn test_prepare_translation_groups_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("pairs.jsonl");

        let mut rows: Vec<serde_json::Value> = Vec::new();
        for (src, tgt) in LANGUAGE_PAIRS {
            for i in 0..3 {
                rows.push(serde_json::json!({
                    "source_lang": src,
                    "target_lang": tgt,
                    "source_text": format!("text {} {}", tgt, i),
                    "target_text": format!("texto {} {}", tgt, i),
                }));
            }
        }
        io::write_jsonl(&source, &rows).unwrap();

        let out = dir.path().join("translation.jsonl");
        let total = prepare_translation(&source, &out, 2, DEFAULT_SEED).unwrap();
        assert_eq!(total, 10);
    }
}
