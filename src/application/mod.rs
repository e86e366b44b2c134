// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// one command (split, train or compare).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
//   config.rs           — SplitConfig, TrainConfig, ModelConfig
//   split_use_case.rs   — load + stratified split + metadata
//   train_use_case.rs   — one model: train, then evaluate
//   compare_use_case.rs — ComparisonHarness over several models
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

/// Run configuration, serialisable to JSON
pub mod config;

/// Load the corpus and fix its partition
pub mod split_use_case;

/// The single-model training workflow
pub mod train_use_case;

/// Multi-model comparison workflow
pub mod compare_use_case;
