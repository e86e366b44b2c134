// ============================================================
// Layer 3 — Split Domain Types
// ============================================================
// A Split is a named, ordered list of sample INDICES into a
// SampleStore. Samples are never copied into splits: the
// store owns them and every split just points at them.
//
// Invariants for a SplitSet produced by the splitter:
//   - train, val and test are pairwise disjoint
//   - their union is every index of the store
//   - every class with >= 3 samples appears in all three
//
// Reference: Rust Book §6 (Enums), §8 (Vectors)

use serde::{Deserialize, Serialize};

use crate::domain::error::TrainError;

/// Accepted deviation of the ratio sum from 1.0.
pub const RATIO_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitName {
    Train,
    Val,
    Test,
}

impl SplitName {
    pub const ALL: [SplitName; 3] = [SplitName::Train, SplitName::Val, SplitName::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            SplitName::Train => "train",
            SplitName::Val   => "val",
            SplitName::Test  => "test",
        }
    }
}

impl std::fmt::Display for SplitName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Train / validation / test proportions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitRatios {
    pub train: f64,
    pub val:   f64,
    pub test:  f64,
}

impl SplitRatios {
    pub fn new(train: f64, val: f64, test: f64) -> Self {
        Self { train, val, test }
    }

    /// Every ratio must be a positive finite number and the
    /// three must sum to 1.0 within `RATIO_TOLERANCE`.
    pub fn validate(&self) -> Result<(), TrainError> {
        let parts = [self.train, self.val, self.test];
        let all_positive = parts.iter().all(|r| r.is_finite() && *r > 0.0);
        let sum: f64 = parts.iter().sum();

        if !all_positive || (sum - 1.0).abs() > RATIO_TOLERANCE {
            return Err(TrainError::InvalidRatios {
                train: self.train,
                val:   self.val,
                test:  self.test,
            });
        }
        Ok(())
    }
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self::new(0.70, 0.15, 0.15)
    }
}

/// One named partition of sample indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub name:    SplitName,
    pub indices: Vec<usize>,
}

impl Split {
    pub fn new(name: SplitName, indices: Vec<usize>) -> Self {
        Self { name, indices }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// The three disjoint partitions of one SampleStore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSet {
    pub train: Split,
    pub val:   Split,
    pub test:  Split,
}

impl SplitSet {
    pub fn get(&self, name: SplitName) -> &Split {
        match name {
            SplitName::Train => &self.train,
            SplitName::Val   => &self.val,
            SplitName::Test  => &self.test,
        }
    }

    pub fn total(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }
}
