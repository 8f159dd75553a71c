// ============================================================
// Layer 3 — Core Traits
// ============================================================
// The evaluator only needs "give me logits for this batch".
// Both exported models implement this, and tests can plug in
// a hand-written classifier without touching Burn.

use anyhow::Result;

/// Anything that maps a batch of inputs to one logits row per input.
pub trait Classifier {
    type Input;

    /// Returns `batch.len()` rows, in input order.
    fn logits(&self, batch: &[Self::Input]) -> Result<Vec<Vec<f32>>>;

    /// Number of output classes (row width).
    fn num_classes(&self) -> usize;
}
