// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the output directory:
//
//   checkpoint.rs — best-model checkpoints, one file per model
//                   identity, replaced atomically (tmp + rename)
//                   so a reader never sees a half-written file
//
//   metrics.rs    — per-epoch records: CSV appended while a run
//                   progresses, full JSON history when it stops
//
//   artifacts.rs  — split metadata, evaluation reports and the
//                   comparison table as pretty-printed JSON
//
// Resulting layout of an output directory:
//
//   out/
//   ├── metadata.json
//   ├── train_config.json
//   ├── metrics_<id>.csv
//   ├── history_<id>.json
//   ├── evaluation_<id>.json
//   ├── comparison.json
//   └── checkpoints/
//       └── best_model_<id>.ckpt
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// Best-model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV + JSON history
pub mod metrics;

/// Metadata, evaluation and comparison JSON files
pub mod artifacts;
