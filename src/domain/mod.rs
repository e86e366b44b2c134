// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs, enums and traits that define the core
// concepts of the system.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Keeping burn out of here is what lets the training loop be
// tested with tiny hand-written stub models on any machine.
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Samples, payload shapes and the class-name ↔ label mapping
pub mod sample;

// Named train/val/test partitions and their ratios
pub mod split;

// The error taxonomy shared by every layer
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
