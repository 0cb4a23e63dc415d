use anyhow::{Context, Result};
use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// A fixed-length `[CLS] a [SEP] b [SEP]` sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairSample {
    pub token_ids:   Vec<usize>,
    pub segment_ids: Vec<usize>,
    pub label:       usize,
}

/// A variable-length tagged sentence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagSample {
    pub token_ids: Vec<usize>,
    pub tag_ids:   Vec<usize>,
}

impl TagSample {
    pub fn len(&self) -> usize {
        self.token_ids.len()
    }
}

/// Coarse (word) ids and, per word, fine (jamo) ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedText {
    pub coarse: Vec<usize>,
    pub fine:   Vec<Vec<usize>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NliSample {
    pub premise:    EncodedText,
    pub hypothesis: EncodedText,
    pub label:      usize,
}

/// Records of a corpus file after preprocessing.
pub struct Corpus<S> {
    samples: Vec<S>,
}

impl<S> Corpus<S> {
    pub fn new(samples: Vec<S>) -> Self {
        Self { samples }
    }

    /// Apply `transform` to every record; the first failing record
    /// aborts with its position in the file.
    pub fn from_records<R, F>(records: Vec<R>, mut transform: F) -> Result<Self>
    where
        F: FnMut(&R) -> Result<S>,
    {
        let samples = records
            .iter()
            .enumerate()
            .map(|(i, r)| transform(r).with_context(|| format!("record #{}", i + 1)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(samples))
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

impl<S: Clone + Send + Sync> Dataset<S> for Corpus<S> {
    fn get(&self, index: usize) -> Option<S> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    #[test]
    fn test_from_records_applies_transform() {
        let corpus = Corpus::from_records(vec![1usize, 2, 3], |x| Ok(x * 10)).unwrap();
        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus.get(1), Some(20));
        assert_eq!(corpus.get(3), None);
    }

    #[test]
    fn test_from_records_reports_failing_record() {
        let err = Corpus::<usize>::from_records(vec![1usize, 0], |x| {
            if *x == 0 { bail!("zero") } else { Ok(*x) }
        })
        .err()
        .unwrap();
        assert!(format!("{err:#}").contains("record #2"));
    }
}
