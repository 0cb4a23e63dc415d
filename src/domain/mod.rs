// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits that define the core concepts
// shared by the three pipelines (pairwise classification,
// sequence tagging, natural-language inference).
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits

/// Raw labelled examples as read from a corpus file
pub mod example;

/// Token <-> index mapping with reserved tokens
pub mod vocab;

/// BIO tag roles and chunk spans
pub mod chunk;

/// The three supported pipelines
pub mod task;

/// Core abstractions (traits) that other layers implement
pub mod traits;
