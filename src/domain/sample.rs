// ============================================================
// Layer 3 — Sample and ClassIndex Domain Types
// ============================================================
// A Sample is one recorded hand sign: either a single flat
// feature vector (21 landmarks × 3 coordinates = 63 values)
// or a temporal sequence of such frames.
//
// Sequences are stored row-major in ONE contiguous Vec<f32>:
//   [f0_x0, f0_y0, f0_z0, ..., f1_x0, ...]
// so batching can copy whole frames with a single slice copy
// instead of walking nested Vec<Vec<f32>>.
//
// The ClassIndex is the bijection between class names
// ("a", "b", ..., "zero") and dense integer labels.
// It is built once from the SORTED set of names, so the
// same corpus always yields the same label numbering.
//
// Reference: Rust Book §5 (Structs), §8 (HashMap/BTreeMap)

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

/// Landmarks detected per hand.
pub const LANDMARKS_PER_HAND: usize = 21;

/// Coordinates per landmark (x, y, z).
pub const COORDS_PER_LANDMARK: usize = 3;

/// Values in one flattened frame.
pub const FRAME_DIM: usize = LANDMARKS_PER_HAND * COORDS_PER_LANDMARK;

/// How a sample's numeric payload is shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// One fixed-length feature vector per sample
    Flat,
    /// A variable-length sequence of frames per sample
    Sequence,
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Modality::Flat     => write!(f, "flat"),
            Modality::Sequence => write!(f, "sequence"),
        }
    }
}

/// Numeric payload of a sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SampleData {
    Features(Vec<f32>),
    Sequence {
        /// Row-major frames, `frame_count * frame_dim` values
        frames:      Vec<f32>,
        frame_count: usize,
        frame_dim:   usize,
    },
}

impl SampleData {
    /// Build a sequence payload, checking the buffer matches the shape.
    pub fn sequence(frames: Vec<f32>, frame_dim: usize) -> Option<Self> {
        if frame_dim == 0 || frames.is_empty() || frames.len() % frame_dim != 0 {
            return None;
        }
        let frame_count = frames.len() / frame_dim;
        Some(SampleData::Sequence { frames, frame_count, frame_dim })
    }

    pub fn modality(&self) -> Modality {
        match self {
            SampleData::Features(_)      => Modality::Flat,
            SampleData::Sequence { .. }  => Modality::Sequence,
        }
    }

    /// Number of timesteps (1 for flat vectors).
    pub fn timesteps(&self) -> usize {
        match self {
            SampleData::Features(_)                 => 1,
            SampleData::Sequence { frame_count, .. } => *frame_count,
        }
    }

    /// Width of one timestep.
    pub fn feature_dim(&self) -> usize {
        match self {
            SampleData::Features(v)                => v.len(),
            SampleData::Sequence { frame_dim, .. } => *frame_dim,
        }
    }

    /// The raw values, regardless of modality.
    pub fn values(&self) -> &[f32] {
        match self {
            SampleData::Features(v)             => v,
            SampleData::Sequence { frames, .. } => frames,
        }
    }
}

/// One labelled sample. Immutable once the SampleStore owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub data: SampleData,

    /// Dense class index, valid for the store's ClassIndex
    pub label: usize,

    /// Class name, e.g. "a" or "seven"
    pub gloss: String,

    /// Where the recording came from (dataset name)
    pub source: String,

    /// Unique id within the corpus (usually the file stem)
    pub id: String,
}

// ─── ClassIndex ───────────────────────────────────────────────────────────────
/// Bijective mapping between class names and `0..num_classes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassIndex {
    names: Vec<String>,
    index: BTreeMap<String, usize>,
}

impl ClassIndex {
    /// Build from any collection of observed names.
    /// Duplicates are collapsed; indices follow sorted order.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        // BTreeMap keys iterate in sorted order, which is what
        // makes label numbering independent of load order
        let mut index: BTreeMap<String, usize> = names
            .into_iter()
            .map(|n| (n.into(), 0))
            .collect();

        let names: Vec<String> = index.keys().cloned().collect();
        for (i, value) in index.values_mut().enumerate() {
            *value = i;
        }

        Self { names, index }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Class names in index order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn label_to_index(&self) -> &BTreeMap<String, usize> {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_index_is_sorted_and_dense() {
        let idx = ClassIndex::from_names(["seven", "a", "b", "a"]);
        assert_eq!(idx.len(), 3);
        assert_eq!(idx.index_of("a"), Some(0));
        assert_eq!(idx.index_of("b"), Some(1));
        assert_eq!(idx.index_of("seven"), Some(2));
        assert_eq!(idx.name_of(2), Some("seven"));
        assert_eq!(idx.name_of(3), None);
    }

    #[test]
    fn test_sequence_shape_checked() {
        assert!(SampleData::sequence(vec![0.0; 6], 3).is_some());
        assert!(SampleData::sequence(vec![0.0; 7], 3).is_none());
        assert!(SampleData::sequence(Vec::new(), 3).is_none());

        let seq = SampleData::sequence(vec![1.0; 9], 3).unwrap();
        assert_eq!(seq.timesteps(), 3);
        assert_eq!(seq.feature_dim(), 3);
        assert_eq!(seq.modality(), Modality::Sequence);
    }
}
