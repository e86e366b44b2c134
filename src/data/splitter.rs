// ============================================================
// Layer 4 — Stratified Train/Validation/Test Splitter
// ============================================================
// Partitions a SampleStore into three disjoint index lists
// while preserving each class's proportion in every split.
//
// Why stratify?
//   A plain shuffle-and-cut over the whole corpus can leave a
//   rare class with zero validation or test samples, and then
//   its accuracy is never measured. Cutting EACH CLASS by the
//   ratios and concatenating the pieces keeps the global class
//   balance in all three splits.
//
// Per class (classes visited in label order):
//
//   shuffled:  [ test ........ | val ......... | train ............ ]
//              round(n*test)    round(rest*val/(train+val))   remainder
//
// Determinism:
//   One StdRng is seeded with `seed` and advanced across the
//   classes in label order. Labels come from the sorted class
//   names and the loader sorts files, so the same corpus and
//   seed always give the same index sets.
//
// Rounding guard:
//   With tiny classes a cut can round to zero. Any empty target
//   takes one sample from the currently largest one, so a class
//   with >= 3 samples is present in all three splits.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom
//
// Reference: rand crate documentation
//            scikit-learn train_test_split(stratify=...)

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::data::store::SampleStore;
use crate::domain::error::TrainError;
use crate::domain::split::{Split, SplitName, SplitRatios, SplitSet};

/// Smallest class that can be represented in all three splits.
pub const MIN_SAMPLES_PER_CLASS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StratifiedSplitter {
    ratios: SplitRatios,
    seed:   u64,
}

impl StratifiedSplitter {
    pub fn new(ratios: SplitRatios, seed: u64) -> Self {
        Self { ratios, seed }
    }

    /// Split `store` into train / val / test.
    ///
    /// # Errors
    /// * `InvalidRatios` if the ratios are not positive or do not sum to 1
    /// * `InsufficientSamples` naming the first class with fewer than 3 samples
    pub fn split(&self, store: &SampleStore) -> Result<SplitSet, TrainError> {
        self.ratios.validate()?;

        let groups = store.indices_by_class();

        // Check every class before doing any work so the error
        // always names the offending class
        for (label, members) in groups.iter().enumerate() {
            if members.len() < MIN_SAMPLES_PER_CLASS {
                return Err(TrainError::InsufficientSamples {
                    class: store.classes().name_of(label).unwrap_or("?").to_string(),
                    count: members.len(),
                });
            }
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut train = Vec::new();
        let mut val   = Vec::new();
        let mut test  = Vec::new();

        for mut members in groups {
            members.shuffle(&mut rng);

            let [n_test, n_val, _] = self.class_counts(members.len());
            test.extend_from_slice(&members[..n_test]);
            val.extend_from_slice(&members[n_test..n_test + n_val]);
            train.extend_from_slice(&members[n_test + n_val..]);
        }

        tracing::debug!(
            "Stratified split (seed {}): {} train, {} val, {} test",
            self.seed,
            train.len(),
            val.len(),
            test.len(),
        );

        Ok(SplitSet {
            train: Split::new(SplitName::Train, train),
            val:   Split::new(SplitName::Val, val),
            test:  Split::new(SplitName::Test, test),
        })
    }

    /// `[test, val, train]` counts for a class of `n >= 3` samples.
    pub fn class_counts(&self, n: usize) -> [usize; 3] {
        let r = &self.ratios;

        let n_test = ((n as f64) * r.test).round() as usize;
        let n_test = n_test.min(n);
        let rest   = n - n_test;
        let n_val  = ((rest as f64) * r.val / (r.train + r.val)).round() as usize;
        let n_val  = n_val.min(rest);

        let mut counts = [n_test, n_val, rest - n_val];

        // Force-assign one sample from the largest bucket to any
        // empty one. n >= 3 guarantees this terminates.
        while let Some(empty) = counts.iter().position(|&c| c == 0) {
            let largest = (0..3).max_by_key(|&i| counts[i]).unwrap_or(0);
            if counts[largest] <= 1 {
                break;
            }
            counts[largest] -= 1;
            counts[empty]   += 1;
        }

        counts
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::SampleRecord;
    use crate::domain::sample::SampleData;
    use std::collections::HashSet;

    fn store_with(class_sizes: &[(&str, usize)]) -> SampleStore {
        let mut records = Vec::new();
        for (gloss, n) in class_sizes {
            for i in 0..*n {
                records.push(SampleRecord {
                    gloss:  gloss.to_string(),
                    source: "test".into(),
                    id:     format!("{gloss}_{i}"),
                    data:   SampleData::Features(vec![i as f32]),
                });
            }
        }
        SampleStore::from_records(records).unwrap()
    }

    fn alphabet_store(per_class: usize) -> SampleStore {
        let letters: Vec<String> = ('a'..='z').map(|c| c.to_string()).collect();
        let sizes: Vec<(&str, usize)> = letters.iter().map(|l| (l.as_str(), per_class)).collect();
        store_with(&sizes)
    }

    #[test]
    fn test_partition_is_disjoint_and_complete() {
        let store = store_with(&[("a", 10), ("b", 7), ("c", 3), ("d", 41)]);
        let splits = StratifiedSplitter::new(SplitRatios::default(), 7).split(&store).unwrap();

        assert_eq!(splits.total(), store.len());

        let mut seen = HashSet::new();
        for name in SplitName::ALL {
            for &i in &splits.get(name).indices {
                assert!(seen.insert(i), "index {i} appears twice");
            }
        }
        assert_eq!(seen.len(), store.len());
    }

    #[test]
    fn test_every_class_in_every_split() {
        let store = store_with(&[("a", 3), ("b", 4), ("c", 5), ("d", 100)]);
        let splits = StratifiedSplitter::new(SplitRatios::default(), 1).split(&store).unwrap();

        for name in SplitName::ALL {
            let counts = store.class_counts(&splits.get(name).indices);
            assert_eq!(counts.len(), 4, "split {name} is missing a class");
        }
    }

    #[test]
    fn test_same_seed_same_split() {
        let store = alphabet_store(20);
        let a = StratifiedSplitter::new(SplitRatios::default(), 42).split(&store).unwrap();
        let b = StratifiedSplitter::new(SplitRatios::default(), 42).split(&store).unwrap();
        assert_eq!(a, b);

        let c = StratifiedSplitter::new(SplitRatios::default(), 43).split(&store).unwrap();
        assert_ne!(a.train.indices, c.train.indices);
    }

    #[test]
    fn test_26_classes_of_60() {
        let store = alphabet_store(60);
        let splits = StratifiedSplitter::new(SplitRatios::new(0.70, 0.15, 0.15), 42)
            .split(&store)
            .unwrap();

        for (name, expected) in [(SplitName::Train, 42), (SplitName::Val, 9), (SplitName::Test, 9)] {
            let counts = store.class_counts(&splits.get(name).indices);
            assert_eq!(counts.len(), 26);
            for (class, n) in counts {
                assert!(
                    (n as i64 - expected).abs() <= 1,
                    "class {class} has {n} in {name}, expected {expected}±1"
                );
            }
        }
    }

    #[test]
    fn test_rounding_never_empties_a_split() {
        let splitter = StratifiedSplitter::new(SplitRatios::new(0.90, 0.05, 0.05), 0);
        for n in 3..30 {
            let counts = splitter.class_counts(n);
            assert!(counts.iter().all(|&c| c >= 1), "n={n} gave {counts:?}");
            assert_eq!(counts.iter().sum::<usize>(), n);
        }
    }

    #[test]
    fn test_insufficient_class_is_named() {
        let store = store_with(&[("a", 10), ("rare", 2)]);
        let err = StratifiedSplitter::new(SplitRatios::default(), 0).split(&store).unwrap_err();
        match err {
            TrainError::InsufficientSamples { class, count } => {
                assert_eq!(class, "rare");
                assert_eq!(count, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_ratios_rejected() {
        let store = alphabet_store(5);
        let err = StratifiedSplitter::new(SplitRatios::new(0.5, 0.5, 0.5), 0)
            .split(&store)
            .unwrap_err();
        assert!(matches!(err, TrainError::InvalidRatios { .. }));
    }
}
