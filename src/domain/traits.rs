// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// Programming against traits lets each pipeline pick its own
// tokenisation strategy while the preprocessors stay generic:
//   - WordSplitter       → whitespace + punctuation
//   - JamoSplitter       → Hangul syllables into jamo
//   - PretrainedSplitter → sub-word tokens from tokenizer.json

use anyhow::Result;

// ─── Splitter ─────────────────────────────────────────────────────────────────
/// Turns raw text into a sequence of tokens.
///
/// `Send + Sync` so a preprocessor holding a boxed splitter can be
/// shared with Burn's data loader workers.
pub trait Splitter: Send + Sync {
    /// Split `text` into tokens. Empty input yields an empty Vec.
    fn split(&self, text: &str) -> Result<Vec<String>>;
}
