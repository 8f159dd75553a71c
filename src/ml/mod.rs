// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All model architectures and loops that touch Burn modules.
//
//   cnn.rs        — the digit classifier
//   bert.rs       — the sentence classifier
//   trainer.rs    — training + per-epoch evaluation loops
//   inferencer.rs — exported-bundle inference on the CPU
//   evaluator.rs  — batched accuracy over any Classifier
//   scoring.rs    — softmax / argmax helpers

pub mod bert;
pub mod cnn;
pub mod evaluator;
pub mod inferencer;
pub mod scoring;
pub mod trainer;
