// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from landmark records on disk to dense batches:
//
//   <class>/<id>.json files
//       │
//       ▼
//   JsonSampleLoader   → decodes records, skips corrupt ones
//       │
//       ▼
//   SampleStore        → labels samples, owns them read-only
//       │
//       ▼
//   StratifiedSplitter → train / val / test index lists
//       │
//       ▼
//   SequenceBatcher    → padded batches + true lengths
//       │
//       ▼
//   TrainingLoop / Evaluator (Layer 5)
//
// Each module is responsible for exactly one step.
//
// Reference: Rust Book §13 (Iterators and Closures)

/// Loads landmark records from a class-per-directory tree
pub mod loader;

/// Owns the labelled samples and the class index
pub mod store;

/// Deterministic stratified train/val/test splitting
pub mod splitter;

/// Groups samples into zero-padded dense batches
pub mod batcher;
