use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

#[derive(Parser)]
#[command(name = "epistemic")]
#[command(about = "LLM evaluation pipelines for epistemic-quality indicators")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run inference for one indicator over its dataset
    Run {
        /// Indicator selector (see `epistemic list`)
        indicator: String,

        /// Directory containing the indicator's dataset files
        #[arg(long)]
        dataset: PathBuf,

        /// Model to evaluate, repeatable: [LABEL=]PROVIDER/MODEL
        #[arg(long = "model", required = true, value_name = "[LABEL=]PROVIDER/MODEL")]
        models: Vec<String>,

        /// Root directory for responses, logs and scores
        #[arg(long, default_value = "runs")]
        work_dir: PathBuf,

        /// Only process the first N items of each dataset file
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Score stored responses against the dataset and write reports
    Score {
        /// Indicator selector (see `epistemic list`)
        indicator: String,

        /// Directory containing the indicator's dataset files
        #[arg(long)]
        dataset: PathBuf,

        /// Model label to score, repeatable
        #[arg(long = "model", required = true, value_name = "LABEL")]
        models: Vec<String>,

        /// Root directory for responses, logs and scores
        #[arg(long, default_value = "runs")]
        work_dir: PathBuf,

        /// TOML file overriding rubric thresholds
        #[arg(long)]
        thresholds: Option<PathBuf>,

        /// Skip network-backed citation validity checks
        #[arg(long)]
        offline: bool,
    },

    /// Build evaluation datasets from local source files
    Prepare {
        #[command(subcommand)]
        target: commands::prepare::PrepareTarget,
    },

    /// List registered indicators and their dataset files
    List,
}

pub async fn cli() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            indicator,
            dataset,
            models,
            work_dir,
            limit,
        } => commands::run::handle_run(&indicator, &dataset, &models, &work_dir, limit).await,
        Commands::Score {
            indicator,
            dataset,
            models,
            work_dir,
            thresholds,
            offline,
        } => {
            commands::score::handle_score(
                &indicator,
                &dataset,
                &models,
                &work_dir,
                thresholds.as_deref(),
                offline,
            )
            .await
        }
        Commands::Prepare { target } => commands::prepare::handle_prepare(target),
        Commands::List => {
            commands::list_indicators();
            Ok(())
        }
    }
}
