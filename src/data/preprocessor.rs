// ============================================================
// Layer 4 — Preprocessors
// ============================================================
// "text → padded index sequence" transforms, one per pipeline.
// Each wraps a vocabulary and a Splitter.
//
//   normalize         — cleans raw corpus text before splitting
//   PadSequence       — truncate / right-pad to a fixed length
//   PairPreProcessor  — [CLS] a [SEP] b [SEP] + segment ids
//   TagPreProcessor   — token ids + tag ids for the tagger
//   SanPreProcessor   — coarse (word) ids + fine (jamo) ids per word

use anyhow::{anyhow, bail, Result};

use crate::data::dataset::{EncodedText, NliSample, PairSample, TagSample};
use crate::domain::{
    example::{TaggedSentence, TextPair},
    traits::Splitter,
    vocab::Vocab,
};

/// Clean raw text before tokenisation:
///   1. Map tabs, non-breaking / zero-width spaces, BOM and control
///      characters to plain spaces
///   2. Collapse runs of whitespace into one space
///   3. Trim both ends
pub fn normalize(text: &str) -> String {
    let mapped: String = text
        .chars()
        .map(|c| match c {
            '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();

    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ─── PadSequence ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy)]
pub struct PadSequence {
    pub length:  usize,
    pub pad_val: usize,
}

impl PadSequence {
    pub fn new(length: usize, pad_val: usize) -> Self {
        Self { length, pad_val }
    }

    /// Truncate to `length`, or right-pad with `pad_val` up to it.
    pub fn apply(&self, mut seq: Vec<usize>) -> Vec<usize> {
        seq.truncate(self.length);
        seq.resize(self.length, self.pad_val);
        seq
    }
}

// ─── PairPreProcessor ─────────────────────────────────────────────────────────
pub struct PairPreProcessor {
    vocab:    Vocab,
    splitter: Box<dyn Splitter>,
    pad:      PadSequence,
}

impl PairPreProcessor {
    pub fn new(vocab: Vocab, splitter: Box<dyn Splitter>, length: usize) -> Self {
        let pad = PadSequence::new(length, vocab.padding_index());
        Self { vocab, splitter, pad }
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    /// Encode a pair as `[bos] a [eos] b [eos]`, padded to the fixed length.
    /// Segment ids are 0 for the first sentence (with bos and its eos),
    /// 1 for the second, and 0 for padding.
    pub fn preprocess(&self, pair: &TextPair) -> Result<PairSample> {
        let left  = self.splitter.split(&normalize(&pair.left))?;
        let right = self.splitter.split(&normalize(&pair.right))?;

        let mut tokens: Vec<&str> = Vec::with_capacity(left.len() + right.len() + 3);
        tokens.extend(self.vocab.bos_token());
        tokens.extend(left.iter().map(String::as_str));
        tokens.extend(self.vocab.eos_token());
        let first_len = tokens.len();
        tokens.extend(right.iter().map(String::as_str));
        tokens.extend(self.vocab.eos_token());

        let mut segments = vec![0usize; first_len];
        segments.resize(tokens.len(), 1);

        let token_ids   = self.pad.apply(self.vocab.to_indices(&tokens));
        let segment_ids = PadSequence::new(self.pad.length, 0).apply(segments);

        Ok(PairSample { token_ids, segment_ids, label: pair.label })
    }
}

// ─── TagPreProcessor ──────────────────────────────────────────────────────────
pub struct TagPreProcessor {
    vocab:     Vocab,
    tag_vocab: Vocab,
}

impl TagPreProcessor {
    pub fn new(vocab: Vocab, tag_vocab: Vocab) -> Self {
        Self { vocab, tag_vocab }
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    pub fn tag_vocab(&self) -> &Vocab {
        &self.tag_vocab
    }

    /// Tokens map through the vocabulary (unknown allowed);
    /// every tag must exist in the tag vocabulary.
    pub fn preprocess(&self, sentence: &TaggedSentence) -> Result<TagSample> {
        if sentence.tokens.len() != sentence.tags.len() {
            bail!(
                "{} tokens but {} tags",
                sentence.tokens.len(),
                sentence.tags.len()
            );
        }
        let token_ids = self.vocab.to_indices(&sentence.tokens);
        let tag_ids = sentence
            .tags
            .iter()
            .map(|t| {
                self.tag_vocab
                    .strict_index(t)
                    .ok_or_else(|| anyhow!("Unknown tag '{t}'"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(TagSample { token_ids, tag_ids })
    }
}

// ─── SanPreProcessor ──────────────────────────────────────────────────────────
pub struct SanPreProcessor {
    coarse_vocab: Vocab,
    fine_vocab:   Vocab,
    coarse_split: Box<dyn Splitter>,
    fine_split:   Box<dyn Splitter>,
}

impl SanPreProcessor {
    pub fn new(
        coarse_vocab: Vocab,
        fine_vocab:   Vocab,
        coarse_split: Box<dyn Splitter>,
        fine_split:   Box<dyn Splitter>,
    ) -> Self {
        Self { coarse_vocab, fine_vocab, coarse_split, fine_split }
    }

    pub fn coarse_vocab(&self) -> &Vocab {
        &self.coarse_vocab
    }

    pub fn fine_vocab(&self) -> &Vocab {
        &self.fine_vocab
    }

    /// One coarse id per word, and the fine ids of each word's jamo.
    /// Text without any word encodes as a single padding token so that
    /// every sequence has at least one position.
    pub fn encode(&self, text: &str) -> Result<EncodedText> {
        let words = self.coarse_split.split(&normalize(text))?;
        if words.is_empty() {
            return Ok(EncodedText {
                coarse: vec![self.coarse_vocab.padding_index()],
                fine:   vec![vec![self.fine_vocab.padding_index()]],
            });
        }

        let coarse = self.coarse_vocab.to_indices(&words);
        let fine = words
            .iter()
            .map(|w| {
                let pieces = self.fine_split.split(w)?;
                let mut ids = self.fine_vocab.to_indices(&pieces);
                if ids.is_empty() {
                    ids.push(self.fine_vocab.padding_index());
                }
                Ok(ids)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(EncodedText { coarse, fine })
    }

    pub fn preprocess(&self, pair: &TextPair) -> Result<NliSample> {
        Ok(NliSample {
            premise:    self.encode(&pair.left)?,
            hypothesis: self.encode(&pair.right)?,
            label:      pair.label,
        })
    }
}
