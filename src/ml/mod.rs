// ============================================================
// Layer 5 — ML Layer
// ============================================================
// Everything that trains, scores or builds a model.
//
// The training loop and evaluator only see the Model trait, so
// they run unchanged against burn networks and test stubs. All
// burn-specific code is confined to model.rs, architectures.rs
// and registry.rs.
//
//   loss.rs          — host-side cross-entropy, logit gradient
//                      and size-weighted tallies
//   scheduler.rs     — reduce-on-plateau learning rate
//   trainer.rs       — epoch loop, early stopping, checkpoints
//   evaluator.rs     — checkpoint replay on the test split,
//                      per-class accuracy and confusion matrix
//   model.rs         — BurnClassifier: burn module + Adam
//                      behind the Model trait
//   architectures.rs — MLP, GRU and transformer networks
//   registry.rs      — builds a network by identity
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

pub mod loss;
pub mod scheduler;

/// Epoch loop with early stopping and best-checkpoint tracking
pub mod trainer;

/// Replays the best checkpoint over a held-out split
pub mod evaluator;

pub mod model;
pub mod architectures;
pub mod registry;

#[cfg(test)]
pub(crate) mod stubs;
