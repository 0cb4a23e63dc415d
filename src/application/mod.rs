// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// one command (train, evaluate, build-vocab or split).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - File formats belong to Layer 4 and 6
//   - Only workflow coordination

// Task-specific wiring shared by the use cases
pub mod pipeline;

// Training loop setup
pub mod train_use_case;

// Checkpoint restore + scoring one split
pub mod evaluate_use_case;

// build-vocab and split
pub mod prepare_use_case;
