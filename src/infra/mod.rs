// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by several pipelines:
//
//   config.rs       — JSON config namespaces (data / model)
//   vocab_store.rs  — vocabulary, tokenizer and embedding files
//   checkpoint.rs   — model + optimizer state via CompactRecorder
//   summary.rs      — summary.json accumulated across runs
//   metrics.rs      — TensorBoard-style scalar log (CSV)

/// JSON configuration loading
pub mod config;

/// Vocabulary and tokenizer persistence
pub mod vocab_store;

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Per-split metric summaries
pub mod summary;

/// Scalar series logger
pub mod metrics;
