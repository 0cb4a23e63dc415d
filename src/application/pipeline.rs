// ============================================================
// Layer 2 — Task Wiring
// ============================================================
// The pieces every use case needs for a given task, built from
// the two JSON namespaces:
//
//   data config   → vocabularies → preprocessor → Corpus
//   model config  → model architecture (same for train and evaluate)
//
// Data config keys per task:
//   pairwise: train, validation, test, vocab, [tokenizer]
//   tagging:  train, validation, test, vocab, tag_vocab
//   nli:      train, validation, test, coarse_vocab, fine_vocab

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use burn::prelude::*;

use crate::data::{
    dataset::{Corpus, NliSample, PairSample, TagSample},
    loader::{load_labelled_pairs, load_tagged},
    preprocessor::{PairPreProcessor, SanPreProcessor, TagPreProcessor},
    split::{JamoSplitter, PretrainedSplitter, WordSplitter},
};
use crate::domain::{traits::Splitter, vocab::Vocab};
use crate::infra::{
    config::{Config, ModelConfig},
    vocab_store,
};
use crate::ml::{
    classifier::{PairwiseClassifier, PairwiseClassifierConfig},
    san::{San, SanConfig},
    tagger::{BilstmCrf, BilstmCrfConfig},
};

/// Smallest jamo axis handed to the SAN char-CNN
pub const MIN_FINE_LEN: usize = 3;

/// Both namespaces of one experiment.
pub struct Workspace {
    pub data:      Config,
    pub model:     ModelConfig,
    pub model_dir: PathBuf,
}

impl Workspace {
    pub fn open(data_dir: &Path, model_dir: &Path) -> Result<Self> {
        let data  = Config::load(data_dir.join("config.json"))?;
        let model = ModelConfig::load(model_dir)?;
        tracing::debug!("Model config: {:?}", model);
        Ok(Self { data, model, model_dir: model_dir.to_path_buf() })
    }
}

/// Word pieces of the pretrained tokenizer when the data config names
/// one, whitespace words otherwise.
pub fn pair_splitter(data: &Config) -> Result<Box<dyn Splitter>> {
    match data.get_opt::<String>("tokenizer")? {
        Some(path) => Ok(Box::new(PretrainedSplitter::new(vocab_store::load_tokenizer(path)?))),
        None => Ok(Box::new(WordSplitter)),
    }
}

// ─── Preprocessors ────────────────────────────────────────────────────────────
pub fn pair_preprocessor(ws: &Workspace) -> Result<PairPreProcessor> {
    let vocab = vocab_store::load(ws.data.path_of("vocab")?)?;
    Ok(PairPreProcessor::new(vocab, pair_splitter(&ws.data)?, ws.model.length))
}

pub fn tag_preprocessor(ws: &Workspace) -> Result<TagPreProcessor> {
    let vocab     = vocab_store::load(ws.data.path_of("vocab")?)?;
    let tag_vocab = vocab_store::load(ws.data.path_of("tag_vocab")?)?;
    Ok(TagPreProcessor::new(vocab, tag_vocab))
}

pub fn san_preprocessor(ws: &Workspace) -> Result<SanPreProcessor> {
    let coarse = vocab_store::load(ws.data.path_of("coarse_vocab")?)?;
    let fine   = vocab_store::load(ws.data.path_of("fine_vocab")?)?;
    Ok(SanPreProcessor::new(coarse, fine, Box::new(WordSplitter), Box::new(JamoSplitter)))
}

// ─── Corpora ──────────────────────────────────────────────────────────────────
// `split` is a data config key such as "train" or "validation".
// Labels must fall in 0..num_classes and a split may not be empty.
pub fn pair_corpus(ws: &Workspace, pre: &PairPreProcessor, split: &str) -> Result<Corpus<PairSample>> {
    let path   = ws.data.path_of(split)?;
    let corpus = Corpus::from_records(load_labelled_pairs(&path, ws.model.num_classes)?, |p| pre.preprocess(p))?;
    non_empty(corpus, split, &path, "pairs")
}

pub fn tag_corpus(ws: &Workspace, pre: &TagPreProcessor, split: &str) -> Result<Corpus<TagSample>> {
    let path   = ws.data.path_of(split)?;
    let corpus = Corpus::from_records(load_tagged(&path)?, |s| pre.preprocess(s))?;
    non_empty(corpus, split, &path, "sentences")
}

pub fn nli_corpus(ws: &Workspace, pre: &SanPreProcessor, split: &str) -> Result<Corpus<NliSample>> {
    let path   = ws.data.path_of(split)?;
    let corpus = Corpus::from_records(load_labelled_pairs(&path, ws.model.num_classes)?, |p| pre.preprocess(p))?;
    non_empty(corpus, split, &path, "pairs")
}

fn non_empty<S>(corpus: Corpus<S>, split: &str, path: &Path, unit: &str) -> Result<Corpus<S>> {
    if corpus.sample_count() == 0 {
        bail!("'{}' split '{}' has no {}", split, path.display(), unit);
    }
    tracing::info!("Loaded {} '{}' {}", corpus.sample_count(), split, unit);
    Ok(corpus)
}

// ─── Models ───────────────────────────────────────────────────────────────────
/// Uses the vocabulary's pretrained matrix when it has one; its width
/// must then equal `d_model`.
pub fn build_classifier<B: Backend>(cfg: &ModelConfig, vocab: &Vocab, device: &B::Device) -> Result<PairwiseClassifier<B>> {
    let config = PairwiseClassifierConfig::new(
        vocab.len(), cfg.length, cfg.num_classes,
        cfg.d_model, cfg.num_heads, cfg.num_layers, cfg.d_ff,
    )
    .with_dropout(cfg.dropout)
    .with_padding_idx(vocab.padding_index())
    .with_freeze_embedding(cfg.freeze_embedding);

    match vocab.embedding() {
        Some(matrix) => config.init_pretrained(matrix, device),
        None => Ok(config.init(device)),
    }
}

/// Uses the vocabulary's pretrained matrix when it has one.
pub fn build_tagger<B: Backend>(
    cfg:       &ModelConfig,
    vocab:     &Vocab,
    tag_vocab: &Vocab,
    device:    &B::Device,
) -> Result<BilstmCrf<B>> {
    let config = BilstmCrfConfig::new(
        vocab.len(),
        vocab.embedding_dim().unwrap_or(cfg.embedding_dim),
        cfg.hidden_dim,
        tag_vocab.len(),
    )
    .with_padding_idx(vocab.padding_index())
    .with_dropout(cfg.dropout)
    .with_freeze_embedding(cfg.freeze_embedding);

    match vocab.embedding() {
        Some(matrix) => config.init_pretrained(matrix, device),
        None => Ok(config.init(device)),
    }
}

/// Uses the coarse vocabulary's pretrained matrix when it has one.
pub fn build_san<B: Backend>(
    cfg:    &ModelConfig,
    coarse: &Vocab,
    fine:   &Vocab,
    device: &B::Device,
) -> Result<San<B>> {
    let config = SanConfig::new(
        cfg.num_classes,
        coarse.len(),
        coarse.embedding_dim().unwrap_or(cfg.embedding_dim),
        fine.len(),
        cfg.fine_embedding_dim,
        cfg.hidden_dim,
        cfg.multi_step,
        cfg.prediction_drop_ratio,
    )
    .with_kernel_size(MIN_FINE_LEN)
    .with_coarse_padding_idx(coarse.padding_index())
    .with_fine_padding_idx(fine.padding_index())
    .with_dropout(cfg.dropout)
    .with_freeze_embedding(cfg.freeze_embedding);

    match coarse.embedding() {
        Some(matrix) => config.init_pretrained(matrix, device),
        None => Ok(config.init(device)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::domain::vocab::ReservedTokens;
    use burn::backend::NdArray;
    use burn::data::dataset::Dataset;

    fn workspace(dir: &Path, extra: &[(&str, &str)]) -> Workspace {
        let mut data = serde_json::Map::new();
        for (key, file) in extra {
            data.insert(key.to_string(), dir.join(file).display().to_string().into());
        }
        fs::write(dir.join("config.json"), serde_json::Value::Object(data).to_string()).unwrap();
        Workspace {
            data:      Config::load(dir.join("config.json")).unwrap(),
            model:     ModelConfig { length: 8, ..ModelConfig::default() },
            model_dir: dir.to_path_buf(),
        }
    }

    #[test]
    fn test_pair_corpus_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("train.tsv"), "q1\tq2\tlabel\nhello world\thello\t1\n").unwrap();
        let vocab = Vocab::new(ReservedTokens::bert(), ["hello", "world"]);
        vocab_store::save(&vocab, dir.path().join("vocab.json")).unwrap();

        let ws  = workspace(dir.path(), &[("train", "train.tsv"), ("vocab", "vocab.json")]);
        let pre = pair_preprocessor(&ws).unwrap();
        let corpus = pair_corpus(&ws, &pre, "train").unwrap();

        let sample = corpus.get(0).unwrap();
        assert_eq!(sample.token_ids.len(), 8);
        assert_eq!(sample.label, 1);
    }

    #[test]
    fn test_missing_split_key_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = Vocab::new(ReservedTokens::bert(), ["a"]);
        vocab_store::save(&vocab, dir.path().join("vocab.json")).unwrap();

        let ws  = workspace(dir.path(), &[("vocab", "vocab.json")]);
        let pre = pair_preprocessor(&ws).unwrap();
        let err = pair_corpus(&ws, &pre, "test").err().unwrap();
        assert!(err.to_string().contains("'test'"));
    }

    #[test]
    fn test_tagger_uses_pretrained_dimension() {
        let mut vocab = Vocab::new(ReservedTokens::default(), ["a"]);
        vocab.set_embedding(vec![vec![0.0; 4]; 3]).unwrap();
        let tags = Vocab::new(ReservedTokens::default(), ["O"]);

        let model = build_tagger::<NdArray>(&ModelConfig::default(), &vocab, &tags, &Default::default()).unwrap();
        assert_eq!(model.embedding.ops.weight.val().dims(), [3, 4]);
    }

    #[test]
    fn test_label_outside_num_classes_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        // default num_classes is 2
        fs::write(dir.path().join("train.tsv"), "q1\tq2\tlabel\nhello\tworld\t1\nhello\thello\t5\n").unwrap();
        let vocab = Vocab::new(ReservedTokens::bert(), ["hello", "world"]);
        vocab_store::save(&vocab, dir.path().join("vocab.json")).unwrap();

        let ws  = workspace(dir.path(), &[("train", "train.tsv"), ("vocab", "vocab.json")]);
        let pre = pair_preprocessor(&ws).unwrap();
        let err = pair_corpus(&ws, &pre, "train").err().unwrap().to_string();
        assert!(err.contains("train.tsv:3"), "{err}");
        assert!(err.contains("label 5"), "{err}");
    }

    #[test]
    fn test_empty_split_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("val.tsv"), "q1\tq2\tlabel\n").unwrap();
        let vocab = Vocab::new(ReservedTokens::bert(), ["hello"]);
        vocab_store::save(&vocab, dir.path().join("vocab.json")).unwrap();

        let ws  = workspace(dir.path(), &[("validation", "val.tsv"), ("vocab", "vocab.json")]);
        let pre = pair_preprocessor(&ws).unwrap();
        let err = pair_corpus(&ws, &pre, "validation").err().unwrap().to_string();
        assert!(err.contains("'validation'") && err.contains("no pairs"), "{err}");
    }

    #[test]
    fn test_classifier_uses_pretrained_embedding() {
        let cfg = ModelConfig { d_model: 4, num_heads: 2, d_ff: 8, ..ModelConfig::default() };
        let mut vocab = Vocab::new(ReservedTokens::bert(), ["a"]);
        let rows = vocab.len();
        vocab.set_embedding(vec![vec![0.5; 4]; rows]).unwrap();

        let model = build_classifier::<NdArray>(&cfg, &vocab, &Default::default()).unwrap();
        let weight: Vec<f32> = model.token_embedding.ops.weight.val().into_data().to_vec().unwrap();
        assert!(weight.iter().all(|&w| w == 0.5));

        let wide = ModelConfig { d_model: 8, ..cfg };
        assert!(build_classifier::<NdArray>(&wide, &vocab, &Default::default()).is_err());
    }
}
