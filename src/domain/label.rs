// ============================================================
// Layer 3 — Sentiment Labels
// ============================================================
// SST-2 is binary: index 0 is negative, index 1 is positive.
// The order matches the classifier head's output columns.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SentimentLabel {
    Negative,
    Positive,
}

impl SentimentLabel {
    pub const ALL: [SentimentLabel; 2] = [SentimentLabel::Negative, SentimentLabel::Positive];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        match self {
            SentimentLabel::Negative => 0,
            SentimentLabel::Positive => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SentimentLabel::Negative => "negative",
            SentimentLabel::Positive => "positive",
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_round_trip() {
        for label in SentimentLabel::ALL {
            assert_eq!(SentimentLabel::from_index(label.index()), Some(label));
        }
    }

    #[test]
    fn out_of_range_index_is_none() {
        assert_eq!(SentimentLabel::from_index(2), None);
    }

    #[test]
    fn names_match_head_order() {
        assert_eq!(SentimentLabel::Negative.to_string(), "negative");
        assert_eq!(SentimentLabel::Positive.to_string(), "positive");
    }
}
