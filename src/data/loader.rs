// ============================================================
// Layer 4 — Landmark Record Loader
// ============================================================
// Loads hand-landmark records produced by the (external)
// landmark extractor from a directory tree:
//
//   data_dir/
//     a/
//       img_0001.json
//       img_0002.json
//     b/
//       ...
//     seven/
//       ...
//
// The sub-directory name (lowercased) is the class name.
// Each record looks like:
//
//   { "landmarks": [[[x, y, z] × 21] × frames], "source": "kaggle" }
//
// A single-frame record may also drop the outer frame list:
//   { "landmarks": [[x, y, z] × 21] }
//
// Modality decides what we keep:
//   Flat     → the FIRST frame flattened to 63 values
//   Sequence → every frame, row-major, 63 values per frame
//
// Bad records (unparseable JSON, "no hand detected", wrong
// landmark count, non-finite coordinates) are skipped with a
// warning and counted. One bad file never fails the run.
//
// Directory entries are SORTED before loading. read_dir order
// is filesystem dependent, and sample order feeds the seeded
// splitter, so sorting is required for reproducible splits.
//
// Reference: serde_json documentation
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};
use serde::Deserialize;

use crate::domain::error::TrainError;
use crate::domain::sample::{
    Modality, SampleData, COORDS_PER_LANDMARK, FRAME_DIM, LANDMARKS_PER_HAND,
};
use crate::domain::traits::SampleSource;

/// Alphabet letters plus spelled-out digits.
pub const STANDARD_CLASSES: [&str; 36] = [
    "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m",
    "n", "o", "p", "q", "r", "s", "t", "u", "v", "w", "x", "y", "z",
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
];

/// One decoded record, not yet labelled.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub gloss:  String,
    pub source: String,
    pub id:     String,
    pub data:   SampleData,
}

/// A record that was skipped, kept for the final summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub path:   PathBuf,
    pub reason: String,
}

/// Everything a load produced: usable records plus what was skipped.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub records: Vec<SampleRecord>,
    pub skipped: Vec<SkippedRecord>,
}

impl LoadReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

// ─── On-disk record format ────────────────────────────────────────────────────
#[derive(Deserialize)]
#[serde(untagged)]
enum RawLandmarks {
    Frames(Vec<Vec<Vec<f32>>>),
    Single(Vec<Vec<f32>>),
}

#[derive(Deserialize)]
struct RawRecord {
    landmarks: Option<RawLandmarks>,
    #[serde(default)]
    source:    Option<String>,
}

// ─── JsonSampleLoader ─────────────────────────────────────────────────────────
/// Loads `<class>/<id>.json` landmark records from a directory.
pub struct JsonSampleLoader {
    dir:     PathBuf,
    /// When set, only these class names are loaded
    classes: Option<BTreeSet<String>>,
}

impl JsonSampleLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), classes: None }
    }

    /// Restrict loading to the given class names.
    pub fn with_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classes = Some(classes.into_iter().map(|c| c.into().to_lowercase()).collect());
        self
    }

    fn wants(&self, gloss: &str) -> bool {
        self.classes.as_ref().map_or(true, |set| set.contains(gloss))
    }
}

impl SampleSource for JsonSampleLoader {
    fn load_all(&self, modality: Modality) -> Result<LoadReport> {
        let mut report = LoadReport::default();

        for class_dir in sorted_entries(&self.dir)? {
            if !class_dir.is_dir() {
                continue;
            }
            let gloss = match class_dir.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_lowercase(),
                None       => continue,
            };
            if !self.wants(&gloss) {
                tracing::debug!("Ignoring class directory '{}'", class_dir.display());
                continue;
            }

            let mut loaded = 0usize;
            for path in sorted_entries(&class_dir)? {
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                match load_record(&path, &gloss, modality) {
                    Ok(record) => {
                        loaded += 1;
                        report.records.push(record);
                    }
                    // Log a warning but continue, one bad file never fails the run
                    Err(TrainError::CorruptSample { path, reason }) => {
                        tracing::warn!("Skipping '{}': {}", path.display(), reason);
                        report.skipped.push(SkippedRecord { path, reason });
                    }
                    Err(other) => return Err(other.into()),
                }
            }
            tracing::debug!("Class '{}': {} records", gloss, loaded);
        }

        tracing::info!(
            "Loaded {} records from '{}' ({} skipped)",
            report.records.len(),
            self.dir.display(),
            report.skipped_count(),
        );
        Ok(report)
    }
}

/// Directory entries sorted by path.
fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Cannot read directory '{}'", dir.display()))?
    {
        paths.push(entry?.path());
    }
    paths.sort();
    Ok(paths)
}

/// Decode one record file. Every failure is a `CorruptSample`.
fn load_record(path: &Path, gloss: &str, modality: Modality) -> Result<SampleRecord, TrainError> {
    let corrupt = |reason: String| TrainError::CorruptSample {
        path: path.to_path_buf(),
        reason,
    };

    let bytes = fs::read(path).map_err(|e| corrupt(format!("unreadable: {e}")))?;
    let raw: RawRecord = serde_json::from_slice(&bytes)
        .map_err(|e| corrupt(format!("invalid JSON: {e}")))?;

    let frames = match raw.landmarks {
        Some(RawLandmarks::Frames(frames)) => frames,
        Some(RawLandmarks::Single(frame))  => vec![frame],
        None                               => Vec::new(),
    };
    if frames.is_empty() {
        return Err(corrupt("no hand detected".to_string()));
    }

    let mut flat = Vec::with_capacity(frames.len() * FRAME_DIM);
    for (f, frame) in frames.iter().enumerate() {
        if frame.len() != LANDMARKS_PER_HAND {
            return Err(corrupt(format!(
                "frame {f} has {} landmarks, expected {LANDMARKS_PER_HAND}",
                frame.len()
            )));
        }
        for point in frame {
            if point.len() != COORDS_PER_LANDMARK || point.iter().any(|v| !v.is_finite()) {
                return Err(corrupt(format!("frame {f} has a malformed landmark")));
            }
            flat.extend_from_slice(point);
        }
    }

    let data = match modality {
        Modality::Flat => {
            flat.truncate(FRAME_DIM);
            SampleData::Features(flat)
        }
        Modality::Sequence => SampleData::sequence(flat, FRAME_DIM)
            .ok_or_else(|| corrupt("empty sequence".to_string()))?,
    };

    let id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string();

    Ok(SampleRecord {
        gloss:  gloss.to_string(),
        source: raw.source.unwrap_or_else(|| "unknown".to_string()),
        id,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn frame(offset: f32) -> serde_json::Value {
        let points: Vec<Vec<f32>> = (0..LANDMARKS_PER_HAND)
            .map(|i| vec![offset + i as f32, 0.5, -0.25])
            .collect();
        serde_json::json!(points)
    }

    fn write(dir: &Path, class: &str, name: &str, body: &str) {
        let class_dir = dir.join(class);
        fs::create_dir_all(&class_dir).unwrap();
        fs::write(class_dir.join(name), body).unwrap();
    }

    #[test]
    fn test_flat_keeps_first_frame() {
        let tmp = TempDir::new().unwrap();
        let body = serde_json::json!({
            "landmarks": [frame(0.0), frame(100.0)],
            "source": "kaggle"
        });
        write(tmp.path(), "A", "s1.json", &body.to_string());

        let report = JsonSampleLoader::new(tmp.path()).load_all(Modality::Flat).unwrap();
        assert_eq!(report.records.len(), 1);
        let rec = &report.records[0];
        assert_eq!(rec.gloss, "a");
        assert_eq!(rec.id, "s1");
        assert_eq!(rec.source, "kaggle");
        assert_eq!(rec.data.values().len(), FRAME_DIM);
        assert_eq!(rec.data.values()[3], 1.0);
    }

    #[test]
    fn test_sequence_keeps_all_frames() {
        let tmp = TempDir::new().unwrap();
        let body = serde_json::json!({ "landmarks": [frame(0.0), frame(1.0), frame(2.0)] });
        write(tmp.path(), "b", "s1.json", &body.to_string());

        let report = JsonSampleLoader::new(tmp.path()).load_all(Modality::Sequence).unwrap();
        assert_eq!(report.records[0].data.timesteps(), 3);
        assert_eq!(report.records[0].source, "unknown");
    }

    #[test]
    fn test_single_frame_shape_accepted() {
        let tmp = TempDir::new().unwrap();
        let body = serde_json::json!({ "landmarks": frame(0.0) });
        write(tmp.path(), "c", "s1.json", &body.to_string());

        let report = JsonSampleLoader::new(tmp.path()).load_all(Modality::Sequence).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].data.timesteps(), 1);
    }

    #[test]
    fn test_corrupt_records_are_skipped_and_counted() {
        let tmp = TempDir::new().unwrap();
        let good = serde_json::json!({ "landmarks": [frame(0.0)] });
        write(tmp.path(), "a", "good.json", &good.to_string());
        write(tmp.path(), "a", "broken.json", "{ not json");
        write(tmp.path(), "a", "nohand.json", r#"{ "landmarks": null }"#);
        write(tmp.path(), "a", "short.json", r#"{ "landmarks": [[[0.0, 0.0, 0.0]]] }"#);
        write(tmp.path(), "a", "notes.txt", "ignored");

        let report = JsonSampleLoader::new(tmp.path()).load_all(Modality::Flat).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.skipped_count(), 3);
    }

    #[test]
    fn test_class_filter() {
        let tmp = TempDir::new().unwrap();
        let body = serde_json::json!({ "landmarks": [frame(0.0)] }).to_string();
        write(tmp.path(), "a", "s.json", &body);
        write(tmp.path(), "hello", "s.json", &body);

        let report = JsonSampleLoader::new(tmp.path())
            .with_classes(STANDARD_CLASSES)
            .load_all(Modality::Flat)
            .unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].gloss, "a");
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let loader = JsonSampleLoader::new(tmp.path().join("nope"));
        assert!(loader.load_all(Modality::Flat).is_err());
    }
}
