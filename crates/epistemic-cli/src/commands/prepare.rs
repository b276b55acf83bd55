use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use epistemic_bench::datasets;

#[derive(Subcommand)]
pub enum PrepareTarget {
    /// Sample math problems from a GSM8K-format JSONL file
    Math {
        /// GSM8K-format source (question + step-by-step answer)
        #[arg(long)]
        source: PathBuf,
        #[arg(long, default_value = "math_40.jsonl")]
        out: PathBuf,
        #[arg(long, default_value_t = 40)]
        count: usize,
        #[arg(long, default_value_t = datasets::DEFAULT_SEED)]
        seed: u64,
    },

    /// Sample translation pairs per language from a pairs JSONL file
    Translation {
        /// OPUS-books-style pairs (source_lang/target_lang/texts)
        #[arg(long)]
        source: PathBuf,
        #[arg(long, default_value = "translation_40.jsonl")]
        out: PathBuf,
        #[arg(long, default_value_t = 8)]
        per_pair: usize,
        #[arg(long, default_value_t = datasets::DEFAULT_SEED)]
        seed: u64,
    },

    /// Build the 100-prompt uncertainty dataset from MMLU-format rows
    Uncertainty {
        /// MMLU-format source (subject/question/choices/answer)
        #[arg(long)]
        source: PathBuf,
        #[arg(long, default_value = "uncertainty_dataset_100.jsonl")]
        out: PathBuf,
        #[arg(long, default_value_t = datasets::DEFAULT_SEED)]
        seed: u64,
    },

    /// Sample citation prompts from a HotpotQA-format JSON file
    Citation {
        /// HotpotQA-format source (array of objects with a question)
        #[arg(long)]
        source: PathBuf,
        #[arg(long, default_value = "citation_prompts.csv")]
        out: PathBuf,
        #[arg(long, default_value_t = 100)]
        count: usize,
        #[arg(long, default_value_t = datasets::DEFAULT_SEED)]
        seed: u64,
    },
}

pub fn handle_prepare(target: PrepareTarget) -> Result<()> {
    let (written, out) = match target {
        PrepareTarget::Math {
            source,
            out,
            count,
            seed,
        } => (datasets::prepare_math(&source, &out, count, seed)?, out),
        PrepareTarget::Translation {
            source,
            out,
            per_pair,
            seed,
        } => (
            datasets::prepare_translation(&source, &out, per_pair, seed)?,
            out,
        ),
        PrepareTarget::Uncertainty { source, out, seed } => {
            (datasets::prepare_uncertainty(&source, &out, seed)?, out)
        }
        PrepareTarget::Citation {
            source,
            out,
            count,
            seed,
        } => (datasets::prepare_citation(&source, &out, count, seed)?, out),
    };

    println!("Saved {} items to {}", written, out.display());
    Ok(())
}
