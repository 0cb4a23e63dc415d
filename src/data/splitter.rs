// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Backs the `split` command: one labelled corpus becomes the
// "train" and "validation" files of the data config.
//
// Same records + same seed → same split, so a split can be
// regenerated instead of committed.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Seeded shuffle of `records`, then the first `train_fraction` of them
/// (rounded) go to training and the rest to validation.
///
/// ```ignore
/// let (train, validation) = split_train_validation(rows, 0.8, 777);
/// ```
pub fn split_train_validation<T>(mut records: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    records.shuffle(&mut StdRng::seed_from_u64(seed));

    let total = records.len();
    let cut   = ((total as f64) * train_fraction.clamp(0.0, 1.0)).round() as usize;
    let validation = records.split_off(cut.min(total));

    tracing::debug!(
        "Split {} records (seed {}): {} train / {} validation",
        total, seed, records.len(), validation.len(),
    );
    (records, validation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    #[test]
    fn test_split_sizes_follow_fraction() {
        let (train, validation) = split_train_validation(range(100), 0.8, 777);
        assert_eq!((train.len(), validation.len()), (80, 20));
    }

    #[test]
    fn test_no_record_lost_or_duplicated() {
        let (train, validation) = split_train_validation(range(50), 0.7, 1);
        let mut all: Vec<usize> = train.into_iter().chain(validation).collect();
        all.sort_unstable();
        assert_eq!(all, range(50));
    }

    #[test]
    fn test_split_is_reproducible() {
        assert_eq!(
            split_train_validation(range(30), 0.5, 42),
            split_train_validation(range(30), 0.5, 42),
        );
    }

    #[test]
    fn test_edge_fractions() {
        let (train, validation) = split_train_validation(Vec::<usize>::new(), 0.8, 0);
        assert!(train.is_empty() && validation.is_empty());

        let (train, validation) = split_train_validation(range(10), 1.0, 0);
        assert_eq!(train.len(), 10);
        assert!(validation.is_empty());

        // out-of-range fractions are clamped
        let (train, _) = split_train_validation(range(10), 1.5, 0);
        assert_eq!(train.len(), 10);
    }
}
