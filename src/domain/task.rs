// ============================================================
// Layer 3 — Task
// ============================================================

use std::fmt;

/// Which pipeline a command operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Paraphrase detection over `[CLS] a [SEP] b [SEP]`
    Pairwise,
    /// BiLSTM-CRF sequence tagging
    Tagging,
    /// Stochastic Answer Network over premise / hypothesis
    Nli,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Task::Pairwise => "pairwise",
            Task::Tagging  => "tagging",
            Task::Nli      => "nli",
        };
        f.write_str(name)
    }
}
