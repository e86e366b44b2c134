// ============================================================
// Layer 4 — SampleStore
// ============================================================
// The in-memory collection every later stage reads from.
//
// Construction does three things once:
//   1. builds the ClassIndex from the sorted class names
//   2. labels every record with its dense class index
//   3. checks that all samples share one modality and one
//      feature width (mixing 63-wide flat vectors with
//      sequences would break batching later)
//
// After construction the store is read-only. Splits, batchers,
// the trainer and the evaluator all borrow it; none mutate it.
//
// Reference: Rust Book §8 (Vectors), §15 (Borrowing)

use std::collections::BTreeMap;

use crate::data::loader::{LoadReport, SampleRecord};
use crate::domain::error::TrainError;
use crate::domain::sample::{ClassIndex, Modality, Sample};

#[derive(Debug, Clone)]
pub struct SampleStore {
    samples:     Vec<Sample>,
    classes:     ClassIndex,
    modality:    Modality,
    feature_dim: usize,
    /// Records the loader had to drop, reported in summaries
    skipped:     usize,
}

impl SampleStore {
    /// Build a store from decoded records.
    pub fn from_records(records: Vec<SampleRecord>) -> Result<Self, TrainError> {
        let first = records.first().ok_or(TrainError::EmptyDataset)?;
        let modality    = first.data.modality();
        let feature_dim = first.data.feature_dim();

        if let Some(bad) = records
            .iter()
            .find(|r| r.data.modality() != modality || r.data.feature_dim() != feature_dim)
        {
            return Err(TrainError::InvalidConfig(format!(
                "sample '{}' of class '{}' is {} with width {}, expected {} with width {}",
                bad.id,
                bad.gloss,
                bad.data.modality(),
                bad.data.feature_dim(),
                modality,
                feature_dim,
            )));
        }

        let classes = ClassIndex::from_names(records.iter().map(|r| r.gloss.clone()));

        let samples = records
            .into_iter()
            .map(|r| {
                // from_names saw every gloss, so the lookup cannot miss
                let label = classes.index_of(&r.gloss).unwrap_or_default();
                Sample {
                    data:   r.data,
                    label,
                    gloss:  r.gloss,
                    source: r.source,
                    id:     r.id,
                }
            })
            .collect();

        Ok(Self { samples, classes, modality, feature_dim, skipped: 0 })
    }

    /// Build a store from a loader report, keeping its skip count.
    pub fn from_report(report: LoadReport) -> Result<Self, TrainError> {
        let skipped = report.skipped_count();
        let mut store = Self::from_records(report.records)?;
        store.skipped = skipped;
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn classes(&self) -> &ClassIndex {
        &self.classes
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Sample indices grouped by label, in store order.
    pub fn indices_by_class(&self) -> Vec<Vec<usize>> {
        let mut groups = vec![Vec::new(); self.classes.len()];
        for (i, s) in self.samples.iter().enumerate() {
            groups[s.label].push(i);
        }
        groups
    }

    /// Per-class sample counts for a set of indices, keyed by class name.
    pub fn class_counts(&self, indices: &[usize]) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for &i in indices {
            if let Some(s) = self.samples.get(i) {
                *counts.entry(s.gloss.clone()).or_insert(0) += 1;
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample::SampleData;

    fn record(gloss: &str, id: &str, data: SampleData) -> SampleRecord {
        SampleRecord { gloss: gloss.into(), source: "test".into(), id: id.into(), data }
    }

    #[test]
    fn test_labels_follow_sorted_class_names() {
        let store = SampleStore::from_records(vec![
            record("z", "1", SampleData::Features(vec![0.0; 4])),
            record("a", "2", SampleData::Features(vec![0.0; 4])),
            record("m", "3", SampleData::Features(vec![0.0; 4])),
        ])
        .unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.get(0).unwrap().label, 2);
        assert_eq!(store.get(1).unwrap().label, 0);
        assert_eq!(store.get(2).unwrap().label, 1);
        assert_eq!(store.feature_dim(), 4);
        assert_eq!(store.modality(), Modality::Flat);
        assert_eq!(store.indices_by_class(), vec![vec![1], vec![2], vec![0]]);
    }

    #[test]
    fn test_mixed_widths_rejected() {
        let err = SampleStore::from_records(vec![
            record("a", "1", SampleData::Features(vec![0.0; 4])),
            record("b", "2", SampleData::Features(vec![0.0; 5])),
        ])
        .unwrap_err();
        assert!(matches!(err, TrainError::InvalidConfig(_)));
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(
            SampleStore::from_records(Vec::new()),
            Err(TrainError::EmptyDataset)
        ));
    }

    #[test]
    fn test_skip_count_carried_from_report() {
        let report = LoadReport {
            records: vec![record("a", "1", SampleData::Features(vec![1.0]))],
            skipped: vec![crate::data::loader::SkippedRecord {
                path:   "x.json".into(),
                reason: "no hand detected".into(),
            }],
        };
        let store = SampleStore::from_report(report).unwrap();
        assert_eq!(store.skipped(), 1);
    }
}
