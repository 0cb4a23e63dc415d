// ============================================================
// Layer 3 — Vocabulary
// ============================================================
// A bidirectional mapping between tokens and integer indices.
//
// Reserved tokens always occupy the first indices, in order:
//   0  unknown   (<unk> / [UNK])
//   1  padding   (<pad> / [PAD])
//   2  bos       (optional, e.g. [CLS])
//   3  eos       (optional, e.g. [SEP])
// followed by the regular tokens.
//
// A vocabulary can optionally carry a pretrained embedding
// matrix with exactly one row per index.

use std::collections::HashMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_UNKNOWN: &str = "<unk>";
pub const DEFAULT_PADDING: &str = "<pad>";

/// The special tokens of a vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservedTokens {
    pub unknown: String,
    pub padding: String,
    #[serde(default)]
    pub bos: Option<String>,
    #[serde(default)]
    pub eos: Option<String>,
}

impl Default for ReservedTokens {
    fn default() -> Self {
        Self {
            unknown: DEFAULT_UNKNOWN.to_string(),
            padding: DEFAULT_PADDING.to_string(),
            bos:     None,
            eos:     None,
        }
    }
}

impl ReservedTokens {
    /// The BERT convention used by the pairwise pipeline.
    pub fn bert() -> Self {
        Self {
            unknown: "[UNK]".to_string(),
            padding: "[PAD]".to_string(),
            bos:     Some("[CLS]".to_string()),
            eos:     Some("[SEP]".to_string()),
        }
    }

    fn in_order(&self) -> Vec<&str> {
        let mut out = vec![self.unknown.as_str(), self.padding.as_str()];
        out.extend(self.bos.as_deref());
        out.extend(self.eos.as_deref());
        out
    }
}

/// On-disk form of a [`Vocab`]; the reverse index is rebuilt on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "VocabRecord", into = "VocabRecord")]
pub struct Vocab {
    reserved:     ReservedTokens,
    idx_to_token: Vec<String>,
    token_to_idx: HashMap<String, usize>,
    embedding:    Option<Vec<Vec<f32>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VocabRecord {
    reserved:     ReservedTokens,
    idx_to_token: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    embedding:    Option<Vec<Vec<f32>>>,
}

impl TryFrom<VocabRecord> for Vocab {
    type Error = anyhow::Error;

    fn try_from(r: VocabRecord) -> Result<Self> {
        let reserved = r.reserved.in_order();
        for (i, token) in reserved.iter().enumerate() {
            if r.idx_to_token.get(i).map(String::as_str) != Some(*token) {
                bail!("reserved token '{token}' must be stored at index {i}");
            }
        }
        let mut vocab = Vocab::from_parts(r.reserved, r.idx_to_token);
        if let Some(matrix) = r.embedding {
            vocab.set_embedding(matrix)?;
        }
        Ok(vocab)
    }
}

impl From<Vocab> for VocabRecord {
    fn from(v: Vocab) -> Self {
        Self { reserved: v.reserved, idx_to_token: v.idx_to_token, embedding: v.embedding }
    }
}

impl Vocab {
    /// Build a vocabulary from reserved tokens plus `tokens`.
    /// Duplicates (including collisions with reserved tokens) are skipped.
    pub fn new<I, S>(reserved: ReservedTokens, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut idx_to_token: Vec<String> =
            reserved.in_order().into_iter().map(str::to_string).collect();
        idx_to_token.extend(tokens.into_iter().map(Into::into));
        Self::from_parts(reserved, idx_to_token)
    }

    fn from_parts(reserved: ReservedTokens, raw: Vec<String>) -> Self {
        let mut idx_to_token = Vec::with_capacity(raw.len());
        let mut token_to_idx = HashMap::with_capacity(raw.len());
        for token in raw {
            if !token_to_idx.contains_key(&token) {
                token_to_idx.insert(token.clone(), idx_to_token.len());
                idx_to_token.push(token);
            }
        }
        Self { reserved, idx_to_token, token_to_idx, embedding: None }
    }

    pub fn len(&self) -> usize {
        self.idx_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idx_to_token.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.token_to_idx.contains_key(token)
    }

    pub fn unknown_index(&self) -> usize {
        0
    }

    pub fn padding_index(&self) -> usize {
        1
    }

    pub fn bos_token(&self) -> Option<&str> {
        self.reserved.bos.as_deref()
    }

    pub fn eos_token(&self) -> Option<&str> {
        self.reserved.eos.as_deref()
    }

    /// Index of `token`, or the unknown index.
    pub fn to_index(&self, token: &str) -> usize {
        self.token_to_idx.get(token).copied().unwrap_or(self.unknown_index())
    }

    pub fn to_indices<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<usize> {
        tokens.iter().map(|t| self.to_index(t.as_ref())).collect()
    }

    /// Index of a token that must be present (tag vocabularies).
    pub fn strict_index(&self, token: &str) -> Option<usize> {
        self.token_to_idx.get(token).copied()
    }

    /// Tokens for the given indices. Out-of-range indices map to the unknown token.
    pub fn to_tokens(&self, indices: &[usize]) -> Vec<&str> {
        indices
            .iter()
            .map(|&i| {
                self.idx_to_token
                    .get(i)
                    .map(String::as_str)
                    .unwrap_or(self.reserved.unknown.as_str())
            })
            .collect()
    }

    pub fn tokens(&self) -> &[String] {
        &self.idx_to_token
    }

    /// Attach a pretrained embedding matrix (one row per index).
    pub fn set_embedding(&mut self, matrix: Vec<Vec<f32>>) -> Result<()> {
        if matrix.len() != self.len() {
            bail!("embedding has {} rows, vocabulary has {} tokens", matrix.len(), self.len());
        }
        let dim = matrix.first().map(Vec::len).unwrap_or(0);
        if dim == 0 || matrix.iter().any(|row| row.len() != dim) {
            bail!("embedding rows must share a non-zero dimension");
        }
        self.embedding = Some(matrix);
        Ok(())
    }

    pub fn embedding(&self) -> Option<&[Vec<f32>]> {
        self.embedding.as_deref()
    }

    pub fn embedding_dim(&self) -> Option<usize> {
        self.embedding.as_ref().and_then(|m| m.first()).map(Vec::len)
    }
}

// ─── VocabBuilder ─────────────────────────────────────────────────────────────
/// Counts tokens and turns the counts into a [`Vocab`].
#[derive(Debug, Default)]
pub struct VocabBuilder {
    counts: HashMap<String, usize>,
}

impl VocabBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<S: AsRef<str>>(&mut self, tokens: &[S]) {
        for t in tokens {
            *self.counts.entry(t.as_ref().to_string()).or_insert(0) += 1;
        }
    }

    /// Sort by frequency descending, ties broken alphabetically so that
    /// two builds over the same corpus are identical.
    pub fn build(self, reserved: ReservedTokens, min_freq: usize, max_size: Option<usize>) -> Vocab {
        let mut words: Vec<(String, usize)> = self
            .counts
            .into_iter()
            .filter(|(_, c)| *c >= min_freq)
            .collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        if let Some(max) = max_size {
            words.truncate(max);
        }
        Vocab::new(reserved, words.into_iter().map(|(w, _)| w))
    }
}
