// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types shared by both pipelines (digits and
// sentiment). No Burn types, no file I/O.
//
//   normalization.rs — pixel normalisation constants
//   label.rs         — sentiment label names
//   prediction.rs    — one classified input (logits + probs)
//   traits.rs        — the Classifier abstraction that the
//                      evaluator runs against

pub mod label;
pub mod normalization;
pub mod prediction;
pub mod traits;
