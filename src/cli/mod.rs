// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap and delegates to Layer 2 (application).
//
//   1. `prepare`  — corpus → tokenizer + token streams
//   2. `train`    — train / evaluate the language model
//   3. `generate` — sample text from a checkpoint
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use commands::{Commands, GenerateArgs, PrepareArgs, TrainArgs};
use crate::application::config::TrainConfig;

#[derive(Parser, Debug)]
#[command(
    name = "transformer",
    version,
    about = "Train and sample an 'Attention Is All You Need' transformer language model."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Directory that should receive `run.log`, if any.
    ///
    /// Only `train` writes one, into its saving path. A `--config`
    /// file may move the saving path, so it is read here too.
    pub fn log_dir(&self) -> Option<PathBuf> {
        match &self.command {
            Commands::Train(args) => {
                let from_file = args
                    .config
                    .as_ref()
                    .and_then(|p| std::fs::read_to_string(p).ok())
                    .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
                    .and_then(|v| v.get("saving_path")?.as_str().map(PathBuf::from));
                Some(from_file.unwrap_or_else(|| PathBuf::from(&args.saving_path)))
            }
            _ => None,
        }
    }

    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Prepare(args)  => run_prepare(args),
            Commands::Train(args)    => run_train(args),
            Commands::Generate(args) => run_generate(args),
        }
    }
}

fn run_prepare(args: PrepareArgs) -> Result<()> {
    use crate::application::prepare_use_case::PrepareUseCase;

    let report = PrepareUseCase::new(args.into()).execute()?;
    println!(
        "Prepared {} documents: {} train / {} val / {} test tokens, vocabulary {}.",
        report.documents, report.train, report.val, report.test, report.vocab_size,
    );
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let config_file = args.config.clone();
    let mut cfg: TrainConfig = args.into();
    if let Some(path) = config_file {
        cfg = cfg.merge_json_file(&path)?;
    }

    let report = TrainUseCase::new(cfg).execute()?;
    if let Some(summary) = &report.summary {
        println!(
            "Training finished at step {}. Final checkpoint: {}",
            summary.final_step,
            summary.final_checkpoint.display(),
        );
    }
    println!(
        "Accuracy: train {:.2}% | test {:.2}%",
        report.train.accuracy * 100.0,
        report.test.accuracy * 100.0,
    );
    Ok(())
}

fn run_generate(args: GenerateArgs) -> Result<()> {
    use crate::application::generate_use_case::GenerateUseCase;

    let prompt = args.prompt.clone();
    let text = GenerateUseCase::new(args.into()).execute()?;
    println!("{prompt}{}{text}", if prompt.is_empty() { "" } else { " " });
    Ok(())
}
