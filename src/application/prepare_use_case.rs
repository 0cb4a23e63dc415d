// ============================================================
// Layer 2 — Data Preparation Use Cases
// ============================================================
// The two commands that run before `train`:
//
//   SplitUseCase       one labelled TSV → the "train" and
//                      "validation" files of the data config
//   BuildVocabUseCase  training split (or tokenizer.json) →
//                      the vocabulary files of the data config
//
// Vocabularies per task:
//   pairwise: vocab         (word pieces of the tokenizer, or words)
//   tagging:  vocab, tag_vocab
//   nli:      coarse_vocab  (words), fine_vocab (jamo)

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};

use crate::application::pipeline;
use crate::data::{
    loader::{load_pairs, load_tagged, read_header, read_rows},
    preprocessor::normalize,
    split::{JamoSplitter, WordSplitter},
    splitter::split_train_validation,
};
use crate::domain::{
    task::Task,
    traits::Splitter,
    vocab::{ReservedTokens, Vocab, VocabBuilder},
};
use crate::infra::{config::Config, vocab_store};
use crate::ml::trainer::SEED;

// ─── Split ────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct SplitConfig {
    pub data_dir: PathBuf,
    pub input:    PathBuf,
    /// Fraction of rows that go to the training file
    pub ratio:    f64,
    pub seed:     u64,
}

pub struct SplitUseCase {
    config: SplitConfig,
}

impl SplitUseCase {
    pub fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    /// Returns the (train, validation) row counts.
    pub fn execute(&self) -> Result<(usize, usize)> {
        let cfg  = &self.config;
        let data = Config::load(cfg.data_dir.join("config.json"))?;

        let header = read_header(&cfg.input)?;
        let rows: Vec<String> = read_rows(&cfg.input, 1)?
            .into_iter()
            .map(|(_, fields)| fields.join("\t"))
            .collect();
        let (train, validation) = split_train_validation(rows, cfg.ratio, cfg.seed);

        write_tsv(data.path_of("train")?, &header, &train)?;
        write_tsv(data.path_of("validation")?, &header, &validation)?;
        tracing::info!(
            "Split '{}' into {} training / {} validation rows",
            cfg.input.display(), train.len(), validation.len()
        );
        Ok((train.len(), validation.len()))
    }
}

fn write_tsv(path: PathBuf, header: &str, rows: &[String]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut body = String::with_capacity(header.len() + rows.iter().map(|r| r.len() + 1).sum::<usize>() + 1);
    body.push_str(header);
    body.push('\n');
    for row in rows {
        body.push_str(row);
        body.push('\n');
    }
    fs::write(&path, body).with_context(|| format!("Cannot write '{}'", path.display()))
}

// ─── Build vocab ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct BuildVocabConfig {
    pub task:      Task,
    pub data_dir:  PathBuf,
    pub min_freq:  usize,
    pub max_size:  Option<usize>,
    /// Pretrained word vectors attached to the word-level vocabulary
    pub embedding: Option<PathBuf>,
}

pub struct BuildVocabUseCase {
    config: BuildVocabConfig,
}

impl BuildVocabUseCase {
    pub fn new(config: BuildVocabConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<()> {
        let cfg  = &self.config;
        let data = Config::load(cfg.data_dir.join("config.json"))?;
        tracing::info!("Building '{}' vocabularies", cfg.task);

        match cfg.task {
            Task::Pairwise => {
                let mut vocab = match data.get_opt::<String>("tokenizer")? {
                    Some(path) => vocab_store::from_tokenizer(&vocab_store::load_tokenizer(path)?),
                    None => {
                        let splitter = pipeline::pair_splitter(&data)?;
                        let mut builder = VocabBuilder::new();
                        for pair in load_pairs(data.path_of("train")?)? {
                            builder.add(&splitter.split(&normalize(&pair.left))?);
                            builder.add(&splitter.split(&normalize(&pair.right))?);
                        }
                        self.finish(builder, ReservedTokens::bert())
                    }
                };
                self.attach_embedding(&mut vocab)?;
                vocab_store::save(&vocab, data.path_of("vocab")?)
            }
            Task::Tagging => {
                let mut words = VocabBuilder::new();
                let mut tags  = VocabBuilder::new();
                for sentence in load_tagged(data.path_of("train")?)? {
                    words.add(&sentence.tokens);
                    tags.add(&sentence.tags);
                }
                let mut vocab = self.finish(words, ReservedTokens::default());
                self.attach_embedding(&mut vocab)?;
                vocab_store::save(&vocab, data.path_of("vocab")?)?;
                // every tag seen in training is kept
                vocab_store::save(&tags.build(ReservedTokens::default(), 1, None), data.path_of("tag_vocab")?)
            }
            Task::Nli => {
                let (word_split, jamo_split) = (WordSplitter, JamoSplitter);
                let mut coarse = VocabBuilder::new();
                let mut fine   = VocabBuilder::new();
                for pair in load_pairs(data.path_of("train")?)? {
                    for text in [&pair.left, &pair.right] {
                        let words = word_split.split(&normalize(text))?;
                        for word in &words {
                            fine.add(&jamo_split.split(word)?);
                        }
                        coarse.add(&words);
                    }
                }
                let mut coarse = self.finish(coarse, ReservedTokens::default());
                self.attach_embedding(&mut coarse)?;
                vocab_store::save(&coarse, data.path_of("coarse_vocab")?)?;
                vocab_store::save(&fine.build(ReservedTokens::default(), 1, None), data.path_of("fine_vocab")?)
            }
        }
    }

    fn finish(&self, builder: VocabBuilder, reserved: ReservedTokens) -> Vocab {
        builder.build(reserved, self.config.min_freq.max(1), self.config.max_size)
    }

    fn attach_embedding(&self, vocab: &mut Vocab) -> Result<()> {
        if let Some(path) = &self.config.embedding {
            vocab_store::load_embedding(vocab, path, SEED)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn data_dir(dir: &Path, keys: &[&str]) -> PathBuf {
        let mut config = serde_json::Map::new();
        for key in keys {
            let file = dir.join(format!("{key}.json"));
            config.insert(key.to_string(), file.display().to_string().into());
        }
        config.insert("train".into(), dir.join("train.tsv").display().to_string().into());
        config.insert("validation".into(), dir.join("val.tsv").display().to_string().into());
        fs::write(dir.join("config.json"), serde_json::Value::Object(config).to_string()).unwrap();
        dir.to_path_buf()
    }

    fn build(task: Task, dir: &Path, embedding: Option<PathBuf>) {
        BuildVocabUseCase::new(BuildVocabConfig {
            task,
            data_dir: dir.to_path_buf(),
            min_freq: 1,
            max_size: None,
            embedding,
        })
        .execute()
        .unwrap();
    }

    #[test]
    fn test_split_keeps_header_and_every_row() {
        let dir = tempfile::tempdir().unwrap();
        let data = data_dir(dir.path(), &[]);
        let input = dir.path().join("all.tsv");
        let rows: String = (0..10).map(|i| format!("a{i}\tb{i}\t{}\n", i % 2)).collect();
        fs::write(&input, format!("q1\tq2\tlabel\n{rows}")).unwrap();

        let counts = SplitUseCase::new(SplitConfig { data_dir: data, input, ratio: 0.8, seed: SEED })
            .execute()
            .unwrap();
        assert_eq!(counts, (8, 2));

        let train = fs::read_to_string(dir.path().join("train.tsv")).unwrap();
        let val   = fs::read_to_string(dir.path().join("val.tsv")).unwrap();
        assert!(train.starts_with("q1\tq2\tlabel\n"));
        assert!(val.starts_with("q1\tq2\tlabel\n"));
        assert_eq!(load_pairs(dir.path().join("train.tsv")).unwrap().len(), 8);
    }

    #[test]
    fn test_tagging_vocabularies() {
        let dir = tempfile::tempdir().unwrap();
        data_dir(dir.path(), &["vocab", "tag_vocab"]);
        fs::write(
            dir.path().join("train.tsv"),
            "sentence\ttags\n김 씨 는 서울 에\tB-PER I-PER O B-LOC O\n",
        )
        .unwrap();

        build(Task::Tagging, dir.path(), None);

        let vocab = vocab_store::load(dir.path().join("vocab.json")).unwrap();
        let tags  = vocab_store::load(dir.path().join("tag_vocab.json")).unwrap();
        assert!(vocab.contains("서울"));
        assert_eq!(tags.len(), 2 + 4);
        assert!(tags.strict_index("B-LOC").is_some());
    }

    #[test]
    fn test_nli_vocabularies_with_embedding() {
        let dir = tempfile::tempdir().unwrap();
        data_dir(dir.path(), &["coarse_vocab", "fine_vocab"]);
        fs::write(dir.path().join("train.tsv"), "premise\thypothesis\tlabel\n나 간다\t너 온다\t0\n").unwrap();
        let vectors = dir.path().join("vec.txt");
        fs::write(&vectors, "간다 0.1 0.2\n온다 0.3 0.4\n").unwrap();

        build(Task::Nli, dir.path(), Some(vectors));

        let coarse = vocab_store::load(dir.path().join("coarse_vocab.json")).unwrap();
        let fine   = vocab_store::load(dir.path().join("fine_vocab.json")).unwrap();
        assert_eq!(coarse.len(), 2 + 4);
        assert_eq!(coarse.embedding_dim(), Some(2));
        assert!(fine.contains("ㄱ"));
    }

    #[test]
    fn test_missing_vocab_key_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        data_dir(dir.path(), &[]);
        fs::write(dir.path().join("train.tsv"), "a\tb\tlabel\nx\ty\t1\n").unwrap();
        let err = BuildVocabUseCase::new(BuildVocabConfig {
            task:      Task::Pairwise,
            data_dir:  dir.path().to_path_buf(),
            min_freq:  1,
            max_size:  None,
            embedding: None,
        })
        .execute()
        .err()
        .unwrap();
        assert!(err.to_string().contains("'vocab'"));
    }
}
