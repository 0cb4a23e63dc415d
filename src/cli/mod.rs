// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Arguments are parsed
// with `clap`; all work is delegated to Layer 2 (application).
//
//   1. `build-vocab` — vocabularies from the training split
//   2. `split`       — train / validation files from one corpus
//   3. `train`       — training loop with best-checkpoint selection
//   4. `evaluate`    — score a split with the best checkpoint

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{BuildVocabArgs, Commands, EvaluateArgs, SplitArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "nlp-tasks",
    version,
    about = "Train and evaluate pairwise classification, sequence tagging and NLI models."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route the subcommand to its use case. Nothing is computed here.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)      => run_train(args),
            Commands::Evaluate(args)   => run_evaluate(args),
            Commands::BuildVocab(args) => run_build_vocab(args),
            Commands::Split(args)      => run_split(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let model_dir = args.common.model_dir.clone();
    TrainUseCase::new(args.into()).execute()?;
    println!("Training complete. Best checkpoint saved in '{}'.", model_dir.display());
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;
    use crate::ml::trainer::describe;

    let summary = EvaluateUseCase::new(args.into()).execute()?;
    println!("{}", describe(&summary));
    Ok(())
}

fn run_build_vocab(args: BuildVocabArgs) -> Result<()> {
    use crate::application::prepare_use_case::BuildVocabUseCase;

    BuildVocabUseCase::new(args.into()).execute()?;
    println!("Vocabularies saved.");
    Ok(())
}

fn run_split(args: SplitArgs) -> Result<()> {
    use crate::application::prepare_use_case::SplitUseCase;

    let (train, validation) = SplitUseCase::new(args.into()).execute()?;
    println!("Wrote {train} training and {validation} validation rows.");
    Ok(())
}
