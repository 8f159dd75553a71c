use serde::{Deserialize, Serialize};

/// The classifier's verdict for one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Index of the highest logit
    pub class_index:   usize,
    pub logits:        Vec<f32>,
    /// Softmax over `logits`, sums to 1
    pub probabilities: Vec<f32>,
}

impl Prediction {
    pub fn confidence(&self) -> f32 {
        self.probabilities.get(self.class_index).copied().unwrap_or(0.0)
    }
}
