// ============================================================
// Layer 3 — Example Domain Types
// ============================================================
// The raw, untokenised records a corpus file contains.
// Preprocessing turns these into index sequences later on.

use serde::{Deserialize, Serialize};

/// Two pieces of text and a class label.
/// Used by both the pairwise classifier (question1, question2,
/// is_duplicate) and the NLI pipeline (premise, hypothesis, label).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPair {
    pub left:  String,
    pub right: String,
    pub label: usize,
}

impl TextPair {
    pub fn new(left: impl Into<String>, right: impl Into<String>, label: usize) -> Self {
        Self { left: left.into(), right: right.into(), label }
    }
}

/// A pre-split sentence with one tag per token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedSentence {
    pub tokens: Vec<String>,
    pub tags:   Vec<String>,
}

impl TaggedSentence {
    pub fn new(tokens: Vec<String>, tags: Vec<String>) -> Self {
        Self { tokens, tags }
    }
}
