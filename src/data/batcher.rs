// ============================================================
// Layer 4 — Batchers
// ============================================================
// Implementations of Burn's Batcher trait: the collate step that
// turns a Vec of samples into tensors on the target device.
//
//   PairBatcher — samples are pre-padded to a fixed length, so
//                 rows are simply stacked: [N, L]; a shorter row
//                 is filled with the vocabulary padding index
//   TagBatcher  — sentences vary in length; rows are padded to
//                 the longest sentence in the batch: [N, S]
//   NliBatcher  — pads words to the longest text and jamo to the
//                 longest word (at least `min_fine_len`): [N, S, C]
//
// Variable-length batches also carry the true lengths on the
// host and a float mask (1.0 = real token, 0.0 = padding).

use std::sync::Arc;

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::dataset::{EncodedText, NliSample, PairSample, TagSample};
use crate::domain::chunk::TagScheme;

/// Flatten rows into `width` columns each, right-padded with `pad`.
fn pad_rows<'a, I>(rows: I, width: usize, pad: usize) -> Vec<i32>
where
    I: IntoIterator<Item = &'a [usize]>,
{
    let mut flat = Vec::new();
    for row in rows {
        flat.extend(row.iter().take(width).map(|&x| x as i32));
        flat.extend(std::iter::repeat(pad as i32).take(width.saturating_sub(row.len())));
    }
    flat
}

fn length_mask<B: Backend>(lengths: &[usize], width: usize, device: &B::Device) -> Tensor<B, 2> {
    let flat: Vec<f32> = lengths
        .iter()
        .flat_map(|&len| (0..width).map(move |i| if i < len { 1.0 } else { 0.0 }))
        .collect();
    Tensor::<B, 1>::from_floats(flat.as_slice(), device).reshape([lengths.len(), width])
}

fn int_vector<B: Backend>(values: impl Iterator<Item = usize>, device: &B::Device) -> Tensor<B, 1, Int> {
    let flat: Vec<i32> = values.map(|x| x as i32).collect();
    Tensor::<B, 1, Int>::from_ints(flat.as_slice(), device)
}

// ─── PairBatch ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct PairBatch<B: Backend> {
    /// [batch_size, length]
    pub token_ids:   Tensor<B, 2, Int>,
    /// [batch_size, length] — 0 first sentence, 1 second
    pub segment_ids: Tensor<B, 2, Int>,
    /// [batch_size]
    pub labels:      Tensor<B, 1, Int>,
}

#[derive(Clone, Debug)]
pub struct PairBatcher<B: Backend> {
    device:    B::Device,
    pad_index: usize,
}

impl<B: Backend> PairBatcher<B> {
    pub fn new(device: B::Device, pad_index: usize) -> Self {
        Self { device, pad_index }
    }
}

impl<B: Backend> Batcher<PairSample, PairBatch<B>> for PairBatcher<B> {
    fn batch(&self, items: Vec<PairSample>) -> PairBatch<B> {
        let batch_size = items.len();
        let length = items.iter().map(|s| s.token_ids.len()).max().unwrap_or(1).max(1);

        let tokens   = pad_rows(items.iter().map(|s| s.token_ids.as_slice()), length, self.pad_index);
        let segments = pad_rows(items.iter().map(|s| s.segment_ids.as_slice()), length, 0);

        PairBatch {
            token_ids: Tensor::<B, 1, Int>::from_ints(tokens.as_slice(), &self.device)
                .reshape([batch_size, length]),
            segment_ids: Tensor::<B, 1, Int>::from_ints(segments.as_slice(), &self.device)
                .reshape([batch_size, length]),
            labels: int_vector(items.iter().map(|s| s.label), &self.device),
        }
    }
}

// ─── TagBatch ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct TagBatch<B: Backend> {
    /// [batch_size, max_len], padded with the vocabulary padding index
    pub token_ids: Tensor<B, 2, Int>,
    /// [batch_size, max_len], padded with 0 (masked out)
    pub tag_ids:   Tensor<B, 2, Int>,
    /// [batch_size, max_len]
    pub mask:      Tensor<B, 2>,
    pub lengths:   Vec<usize>,
    /// Gold tags on the host, for chunk scoring
    pub tags:      Vec<Vec<usize>>,
    pub scheme:    Arc<TagScheme>,
}

#[derive(Clone, Debug)]
pub struct TagBatcher<B: Backend> {
    device:    B::Device,
    pad_index: usize,
    scheme:    Arc<TagScheme>,
}

impl<B: Backend> TagBatcher<B> {
    pub fn new(device: B::Device, pad_index: usize, scheme: Arc<TagScheme>) -> Self {
        Self { device, pad_index, scheme }
    }
}

impl<B: Backend> Batcher<TagSample, TagBatch<B>> for TagBatcher<B> {
    fn batch(&self, items: Vec<TagSample>) -> TagBatch<B> {
        let batch_size = items.len();
        let lengths: Vec<usize> = items.iter().map(TagSample::len).collect();
        let max_len = lengths.iter().copied().max().unwrap_or(1).max(1);

        let tokens = pad_rows(items.iter().map(|s| s.token_ids.as_slice()), max_len, self.pad_index);
        let tags   = pad_rows(items.iter().map(|s| s.tag_ids.as_slice()), max_len, 0);

        TagBatch {
            token_ids: Tensor::<B, 1, Int>::from_ints(tokens.as_slice(), &self.device)
                .reshape([batch_size, max_len]),
            tag_ids: Tensor::<B, 1, Int>::from_ints(tags.as_slice(), &self.device)
                .reshape([batch_size, max_len]),
            mask: length_mask(&lengths, max_len, &self.device),
            lengths,
            tags: items.into_iter().map(|s| s.tag_ids).collect(),
            scheme: Arc::clone(&self.scheme),
        }
    }
}

// ─── NliBatch ─────────────────────────────────────────────────────────────────
/// One side (premise or hypothesis) of an NLI batch.
#[derive(Debug, Clone)]
pub struct SequenceBatch<B: Backend> {
    /// [batch_size, max_words]
    pub coarse:  Tensor<B, 2, Int>,
    /// [batch_size, max_words, max_jamo]
    pub fine:    Tensor<B, 3, Int>,
    /// [batch_size, max_words]
    pub mask:    Tensor<B, 2>,
    pub lengths: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct NliBatch<B: Backend> {
    pub premise:    SequenceBatch<B>,
    pub hypothesis: SequenceBatch<B>,
    /// [batch_size]
    pub labels:     Tensor<B, 1, Int>,
}

#[derive(Clone, Debug)]
pub struct NliBatcher<B: Backend> {
    device:       B::Device,
    coarse_pad:   usize,
    fine_pad:     usize,
    min_fine_len: usize,
}

impl<B: Backend> NliBatcher<B> {
    pub fn new(device: B::Device, coarse_pad: usize, fine_pad: usize, min_fine_len: usize) -> Self {
        Self { device, coarse_pad, fine_pad, min_fine_len }
    }

    fn side(&self, texts: Vec<&EncodedText>) -> SequenceBatch<B> {
        let batch_size = texts.len();
        let lengths: Vec<usize> = texts.iter().map(|t| t.coarse.len()).collect();
        let max_words = lengths.iter().copied().max().unwrap_or(1).max(1);
        let max_jamo = texts
            .iter()
            .flat_map(|t| t.fine.iter().map(Vec::len))
            .max()
            .unwrap_or(1)
            .max(self.min_fine_len);

        let coarse = pad_rows(texts.iter().map(|t| t.coarse.as_slice()), max_words, self.coarse_pad);

        // Pad the word axis with all-padding rows before padding jamo
        let empty: &[usize] = &[];
        let fine_rows = texts.iter().copied().flat_map(|t| {
            (0..max_words).map(move |w| t.fine.get(w).map(Vec::as_slice).unwrap_or(empty))
        });
        let fine = pad_rows(fine_rows, max_jamo, self.fine_pad);

        SequenceBatch {
            coarse: Tensor::<B, 1, Int>::from_ints(coarse.as_slice(), &self.device)
                .reshape([batch_size, max_words]),
            fine: Tensor::<B, 1, Int>::from_ints(fine.as_slice(), &self.device)
                .reshape([batch_size, max_words, max_jamo]),
            mask: length_mask(&lengths, max_words, &self.device),
            lengths,
        }
    }
}

impl<B: Backend> Batcher<NliSample, NliBatch<B>> for NliBatcher<B> {
    fn batch(&self, items: Vec<NliSample>) -> NliBatch<B> {
        let premise    = self.side(items.iter().map(|s| &s.premise).collect());
        let hypothesis = self.side(items.iter().map(|s| &s.hypothesis).collect());
        NliBatch {
            premise,
            hypothesis,
            labels: int_vector(items.iter().map(|s| s.label), &self.device),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vocab::{ReservedTokens, Vocab};
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn ints<const D: usize>(t: Tensor<TestBackend, D, Int>) -> Vec<i64> {
        t.into_data().convert::<i64>().to_vec().unwrap()
    }

    fn floats<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.into_data().to_vec().unwrap()
    }

    #[test]
    fn test_pad_rows() {
        let rows: Vec<Vec<usize>> = vec![vec![1, 2, 3], vec![4]];
        let flat = pad_rows(rows.iter().map(Vec::as_slice), 2, 9);
        assert_eq!(flat, vec![1, 2, 4, 9]);
    }

    #[test]
    fn test_pair_batch_shapes() {
        let batcher = PairBatcher::<TestBackend>::new(Default::default(), 1);
        let sample  = |label| PairSample { token_ids: vec![2, 5, 3, 1], segment_ids: vec![0, 0, 0, 0], label };
        let batch   = batcher.batch(vec![sample(0), sample(1)]);
        assert_eq!(batch.token_ids.dims(), [2, 4]);
        assert_eq!(ints(batch.labels), vec![0, 1]);
    }

    #[test]
    fn test_pair_batch_pads_short_rows_with_pad_index() {
        let batcher = PairBatcher::<TestBackend>::new(Default::default(), 1);
        let batch = batcher.batch(vec![
            PairSample { token_ids: vec![2, 5, 3, 6], segment_ids: vec![0, 0, 0, 1], label: 0 },
            PairSample { token_ids: vec![2, 5],       segment_ids: vec![0, 0],       label: 1 },
        ]);
        assert_eq!(ints(batch.token_ids),   vec![2, 5, 3, 6, 2, 5, 1, 1]);
        assert_eq!(ints(batch.segment_ids), vec![0, 0, 0, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn test_tag_batch_pads_to_longest() {
        let tag_vocab = Vocab::new(ReservedTokens::default(), ["O", "B-X", "I-X"]);
        let scheme    = Arc::new(TagScheme::from_vocab(&tag_vocab));
        let batcher   = TagBatcher::<TestBackend>::new(Default::default(), 1, scheme);
        let batch = batcher.batch(vec![
            TagSample { token_ids: vec![5, 6, 7], tag_ids: vec![2, 3, 2] },
            TagSample { token_ids: vec![8],       tag_ids: vec![4] },
        ]);
        assert_eq!(batch.lengths, vec![3, 1]);
        assert_eq!(ints(batch.token_ids), vec![5, 6, 7, 8, 1, 1]);
        assert_eq!(ints(batch.tag_ids),   vec![2, 3, 2, 4, 0, 0]);
        assert_eq!(floats(batch.mask),    vec![1.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
        assert_eq!(batch.tags[1], vec![4]);
    }

    #[test]
    fn test_nli_batch_pads_both_axes() {
        let batcher = NliBatcher::<TestBackend>::new(Default::default(), 1, 1, 3);
        let text = |coarse: Vec<usize>, fine: Vec<Vec<usize>>| EncodedText { coarse, fine };
        let batch = batcher.batch(vec![
            NliSample {
                premise:    text(vec![4, 5], vec![vec![2, 3], vec![2, 3, 4, 5]]),
                hypothesis: text(vec![4],    vec![vec![2]]),
                label: 1,
            },
            NliSample {
                premise:    text(vec![6],    vec![vec![7]]),
                hypothesis: text(vec![6, 6], vec![vec![7], vec![7]]),
                label: 0,
            },
        ]);

        assert_eq!(batch.premise.fine.dims(), [2, 2, 4]);
        assert_eq!(batch.hypothesis.fine.dims(), [2, 2, 3]);
        assert_eq!(batch.premise.lengths, vec![2, 1]);
        assert_eq!(
            ints(batch.premise.fine),
            vec![2, 3, 1, 1,  2, 3, 4, 5,  7, 1, 1, 1,  1, 1, 1, 1]
        );
        assert_eq!(ints(batch.premise.coarse), vec![4, 5, 6, 1]);
    }
}
