// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between a corpus file on disk and tensor batches.
//
//   corpus .tsv
//       │
//       ▼
//   loader        → reads rows into TextPair / TaggedSentence
//       │
//       ▼
//   split         → tokenises text (words, jamo, word pieces)
//       │
//       ▼
//   preprocessor  → vocabulary lookup + padding
//       │
//       ▼
//   Corpus        → implements Burn's Dataset trait
//       │
//       ▼
//   batchers      → stack / pad samples into tensors
//       │
//       ▼
//   DataLoader    → feeds batches to the training loop

/// Reads TSV corpus files
pub mod loader;

/// Tokenisation strategies
pub mod split;

/// Text → index sequence transforms
pub mod preprocessor;

/// Sample types and the Corpus dataset
pub mod dataset;

/// Burn Batcher implementations (collate)
pub mod batcher;

/// Seeded train/validation split
pub mod splitter;
