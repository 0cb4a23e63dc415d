// ============================================================
// Layer 6 — Vocabulary Store
// ============================================================
// Persistence for vocabularies and the pretrained tokenizer.
//
//   save / load          — Vocab as JSON (see domain::vocab)
//   load_tokenizer       — HuggingFace tokenizer.json
//   from_tokenizer       — Vocab over the tokenizer's word pieces
//   load_embedding       — word2vec / GloVe text vectors attached
//                          to an existing Vocab
//
// Embedding file format (one token per line, optional
// word2vec "count dim" header):
//   3 4
//   서울 0.1 0.2 0.3 0.4
//   ...

use std::{collections::HashMap, fs, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokenizers::Tokenizer;

use crate::domain::vocab::{ReservedTokens, Vocab};

/// Write `vocab` as JSON, creating parent directories.
pub fn save(vocab: &Vocab, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string(vocab)?;
    fs::write(path, json)
        .with_context(|| format!("Cannot write vocabulary to '{}'", path.display()))?;
    tracing::info!("Saved vocabulary ({} tokens) to '{}'", vocab.len(), path.display());
    Ok(())
}

pub fn load(path: impl AsRef<Path>) -> Result<Vocab> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).with_context(|| {
        format!("Cannot read vocabulary '{}'. Have you run 'build-vocab' first?", path.display())
    })?;
    serde_json::from_str(&json)
        .with_context(|| format!("Invalid vocabulary file '{}'", path.display()))
}

/// Load a previously saved tokenizer from JSON file
pub fn load_tokenizer(path: impl AsRef<Path>) -> Result<Tokenizer> {
    let path = path.as_ref();
    Tokenizer::from_file(path)
        .map_err(|e| anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
}

/// Vocabulary over the tokenizer's word pieces, in tokenizer id order,
/// with the BERT special tokens reserved up front.
pub fn from_tokenizer(tokenizer: &Tokenizer) -> Vocab {
    let mut pieces: Vec<(String, u32)> = tokenizer.get_vocab(true).into_iter().collect();
    pieces.sort_by_key(|(_, id)| *id);
    Vocab::new(ReservedTokens::bert(), pieces.into_iter().map(|(token, _)| token))
}

/// Attach pretrained vectors from a text embedding file to `vocab`.
///
/// Tokens without a vector get uniform noise in [-0.1, 0.1);
/// the padding row is all zeros.
pub fn load_embedding(vocab: &mut Vocab, path: impl AsRef<Path>, seed: u64) -> Result<usize> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read embedding file '{}'", path.display()))?;

    let mut vectors: HashMap<&str, Vec<f32>> = HashMap::new();
    let mut dim = None;

    for (lineno, line) in text.lines().enumerate() {
        let mut fields = line.split_whitespace();
        let Some(token) = fields.next() else { continue };
        let values: Vec<f32> = fields
            .map(str::parse::<f32>)
            .collect::<Result<_, _>>()
            .with_context(|| format!("{}:{}: invalid number", path.display(), lineno + 1))?;

        // word2vec header: "<count> <dim>"
        if lineno == 0 && values.len() == 1 && token.parse::<usize>().is_ok() {
            continue;
        }
        match dim {
            None => dim = Some(values.len()),
            Some(d) if d != values.len() => bail!(
                "{}:{}: expected {} values, found {}",
                path.display(), lineno + 1, d, values.len()
            ),
            _ => {}
        }
        vectors.insert(token, values);
    }

    let dim = dim.filter(|d| *d > 0)
        .ok_or_else(|| anyhow!("Embedding file '{}' has no vectors", path.display()))?;

    let mut rng   = StdRng::seed_from_u64(seed);
    let mut found = 0usize;
    let matrix: Vec<Vec<f32>> = vocab
        .tokens()
        .iter()
        .enumerate()
        .map(|(i, token)| {
            if i == vocab.padding_index() {
                vec![0.0; dim]
            } else if let Some(v) = vectors.get(token.as_str()) {
                found += 1;
                v.clone()
            } else {
                (0..dim).map(|_| rng.gen_range(-0.1..0.1)).collect()
            }
        })
        .collect();

    vocab.set_embedding(matrix)?;
    tracing::info!(
        "Attached {}-d embedding: {}/{} tokens found in '{}'",
        dim, found, vocab.len(), path.display()
    );
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/vocab.json");
        let v    = Vocab::new(ReservedTokens::default(), ["a", "b"]);
        save(&v, &path).unwrap();
        let back = load(&path).unwrap();
        assert_eq!(back.tokens(), v.tokens());
    }

    #[test]
    fn test_load_missing_vocab_explains() {
        let err = load("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("build-vocab"));
    }

    #[test]
    fn test_load_embedding_fills_rows() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("vec.txt");
        fs::write(&path, "2 3\na 1 2 3\nzzz 4 5 6\n").unwrap();

        let mut v = Vocab::new(ReservedTokens::default(), ["a", "b"]);
        let found = load_embedding(&mut v, &path, 7).unwrap();
        assert_eq!(found, 1);

        let m = v.embedding().unwrap();
        assert_eq!(m.len(), 4);
        assert_eq!(m[1], vec![0.0, 0.0, 0.0]);      // padding
        assert_eq!(m[2], vec![1.0, 2.0, 3.0]);      // "a"
        assert!(m[3].iter().all(|x| x.abs() < 0.1)); // "b" is noise
    }

    #[test]
    fn test_load_embedding_rejects_ragged_rows() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("vec.txt");
        fs::write(&path, "a 1 2 3\nb 1 2\n").unwrap();
        let mut v = Vocab::new(ReservedTokens::default(), ["a", "b"]);
        assert!(load_embedding(&mut v, &path, 0).is_err());
    }
}
