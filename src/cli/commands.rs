// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the four subcommands and their flags:
//
//   train        --task T [--resume]
//   evaluate     --task T [--dataset validation]
//   build-vocab  --task T [--min-freq N] [--max-size N] [--embedding FILE]
//   split        --input FILE [--ratio 0.8] [--seed 777]
//
// Every task command shares --data-dir and --model-dir.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::application::{
    evaluate_use_case::EvaluateConfig,
    prepare_use_case::{BuildVocabConfig, SplitConfig},
    train_use_case::TrainConfig,
};
use crate::domain::task::Task;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a model and keep the best checkpoint
    Train(TrainArgs),

    /// Score a data split with the best checkpoint
    Evaluate(EvaluateArgs),

    /// Build the vocabularies named in the data config
    BuildVocab(BuildVocabArgs),

    /// Split one labelled file into train and validation files
    Split(SplitArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum TaskArg {
    /// Sentence-pair classification with a transformer encoder
    Pairwise,
    /// Sequence tagging with a BiLSTM-CRF
    Tagging,
    /// Natural language inference with a Stochastic Answer Network
    Nli,
}

impl From<TaskArg> for Task {
    fn from(t: TaskArg) -> Self {
        match t {
            TaskArg::Pairwise => Task::Pairwise,
            TaskArg::Tagging  => Task::Tagging,
            TaskArg::Nli      => Task::Nli,
        }
    }
}

/// Flags shared by the task commands.
#[derive(Args, Debug)]
pub struct CommonArgs {
    #[arg(long, value_enum)]
    pub task: TaskArg,

    /// Directory containing the data config.json
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory containing the model config.json; checkpoints go here too
    #[arg(long, default_value = "experiments/base_model")]
    pub model_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Continue from the "best" checkpoint in --model-dir
    #[arg(long)]
    pub resume: bool,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            task:      a.common.task.into(),
            data_dir:  a.common.data_dir,
            model_dir: a.common.model_dir,
            resume:    a.resume,
        }
    }
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Data config key of the split to score, e.g. "test"
    #[arg(long, default_value = "validation")]
    pub dataset: String,
}

impl From<EvaluateArgs> for EvaluateConfig {
    fn from(a: EvaluateArgs) -> Self {
        EvaluateConfig {
            task:      a.common.task.into(),
            data_dir:  a.common.data_dir,
            model_dir: a.common.model_dir,
            dataset:   a.dataset,
        }
    }
}

#[derive(Args, Debug)]
pub struct BuildVocabArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Drop tokens seen fewer times than this
    #[arg(long, default_value_t = 1)]
    pub min_freq: usize,

    /// Keep at most this many regular tokens
    #[arg(long)]
    pub max_size: Option<usize>,

    /// word2vec / GloVe text file to attach to the word vocabulary
    #[arg(long)]
    pub embedding: Option<PathBuf>,
}

impl From<BuildVocabArgs> for BuildVocabConfig {
    fn from(a: BuildVocabArgs) -> Self {
        BuildVocabConfig {
            task:      a.common.task.into(),
            data_dir:  a.common.data_dir,
            min_freq:  a.min_freq,
            max_size:  a.max_size,
            embedding: a.embedding,
        }
    }
}

#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Labelled TSV file with a header line
    #[arg(long)]
    pub input: PathBuf,

    /// Directory containing the data config.json
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Fraction of rows written to the training file
    #[arg(long, default_value_t = 0.8)]
    pub ratio: f64,

    #[arg(long, default_value_t = 777)]
    pub seed: u64,
}

impl From<SplitArgs> for SplitConfig {
    fn from(a: SplitArgs) -> Self {
        SplitConfig { data_dir: a.data_dir, input: a.input, ratio: a.ratio, seed: a.seed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_defaults() {
        let cli = Cli::try_parse_from(["nlp-tasks", "train", "--task", "tagging"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let config = TrainConfig::from(args);
        assert_eq!(config.task, Task::Tagging);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.model_dir, PathBuf::from("experiments/base_model"));
        assert!(!config.resume);
    }

    #[test]
    fn test_evaluate_dataset() {
        let cli = Cli::try_parse_from(["nlp-tasks", "evaluate", "--task", "nli", "--dataset", "test"]).unwrap();
        let Commands::Evaluate(args) = cli.command else { panic!("expected evaluate") };
        assert_eq!(EvaluateConfig::from(args).dataset, "test");
    }

    #[test]
    fn test_build_vocab_flags() {
        let cli = Cli::try_parse_from([
            "nlp-tasks", "build-vocab", "--task", "pairwise", "--min-freq", "2", "--max-size", "100",
        ])
        .unwrap();
        let Commands::BuildVocab(args) = cli.command else { panic!("expected build-vocab") };
        let config = BuildVocabConfig::from(args);
        assert_eq!((config.min_freq, config.max_size), (2, Some(100)));
        assert!(config.embedding.is_none());
    }

    #[test]
    fn test_split_requires_input() {
        assert!(Cli::try_parse_from(["nlp-tasks", "split"]).is_err());
        let cli = Cli::try_parse_from(["nlp-tasks", "split", "--input", "all.tsv"]).unwrap();
        let Commands::Split(args) = cli.command else { panic!("expected split") };
        assert_eq!(SplitConfig::from(args).ratio, 0.8);
    }

    #[test]
    fn test_task_is_required() {
        assert!(Cli::try_parse_from(["nlp-tasks", "train"]).is_err());
    }
}
