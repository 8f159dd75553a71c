// ============================================================
// Layer 5 — Batched Evaluator
// ============================================================
// Walks the evaluation set in contiguous batches, asks the
// classifier for logits and counts argmax hits. The last batch
// may be short. A batch size of 1 gives one forward pass per
// sample.

use anyhow::{bail, Result};

use crate::domain::traits::Classifier;
use crate::ml::scoring::{accuracy, argmax};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalReport {
    pub correct: usize,
    pub total:   usize,
}

impl EvalReport {
    pub fn accuracy(&self) -> f64 {
        accuracy(self.correct, self.total)
    }
}

pub fn evaluate<C: Classifier>(
    classifier: &C,
    inputs:     &[C::Input],
    labels:     &[usize],
    batch_size: usize,
) -> Result<EvalReport> {
    if inputs.is_empty() {
        bail!("nothing to evaluate: the input set is empty");
    }
    if batch_size == 0 {
        bail!("batch size must be at least 1");
    }
    if inputs.len() != labels.len() {
        bail!("{} inputs but {} labels", inputs.len(), labels.len());
    }

    let mut correct = 0usize;
    for (batch_idx, (batch, truth)) in inputs.chunks(batch_size).zip(labels.chunks(batch_size)).enumerate() {
        let rows = classifier.logits(batch)?;
        if rows.len() != batch.len() {
            bail!("classifier returned {} rows for a batch of {}", rows.len(), batch.len());
        }
        if let Some(row) = rows.iter().find(|r| r.len() != classifier.num_classes()) {
            bail!("classifier returned a row of {} logits, expected {}", row.len(), classifier.num_classes());
        }
        correct += rows
            .iter()
            .zip(truth)
            .filter(|(row, &label)| argmax(row) == Some(label))
            .count();

        tracing::debug!("batch {} done, running correct={}", batch_idx, correct);
    }

    Ok(EvalReport { correct, total: inputs.len() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Predicts the input value itself as the class, records batch sizes.
    struct Echo {
        seen: RefCell<Vec<usize>>,
    }

    impl Classifier for Echo {
        type Input = usize;

        fn logits(&self, batch: &[usize]) -> Result<Vec<Vec<f32>>> {
            self.seen.borrow_mut().push(batch.len());
            Ok(batch
                .iter()
                .map(|&c| (0..3).map(|i| if i == c { 1.0 } else { 0.0 }).collect())
                .collect())
        }

        fn num_classes(&self) -> usize { 3 }
    }

    struct Broken;

    impl Classifier for Broken {
        type Input = usize;

        fn logits(&self, _batch: &[usize]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0, 0.0]])
        }

        fn num_classes(&self) -> usize { 2 }
    }

    #[test]
    fn counts_hits_over_short_final_batch() {
        let echo = Echo { seen: RefCell::new(Vec::new()) };
        let inputs = vec![0, 1, 2, 0, 1];
        let labels = vec![0, 1, 0, 0, 2];

        let report = evaluate(&echo, &inputs, &labels, 2).unwrap();
        assert_eq!(report, EvalReport { correct: 3, total: 5 });
        assert!((report.accuracy() - 0.6).abs() < 1e-12);
        assert_eq!(*echo.seen.borrow(), vec![2, 2, 1]);
    }

    #[test]
    fn batch_size_one_is_per_sample() {
        let echo = Echo { seen: RefCell::new(Vec::new()) };
        evaluate(&echo, &[1, 2, 0], &[1, 2, 0], 1).unwrap();
        assert_eq!(*echo.seen.borrow(), vec![1, 1, 1]);
    }

    #[test]
    fn rejects_degenerate_requests() {
        let echo = Echo { seen: RefCell::new(Vec::new()) };
        assert!(evaluate(&echo, &[], &[], 4).is_err());
        assert!(evaluate(&echo, &[1], &[1], 0).is_err());
        assert!(evaluate(&echo, &[1, 2], &[1], 4).is_err());
    }

    struct Narrow;

    impl Classifier for Narrow {
        type Input = usize;

        fn logits(&self, batch: &[usize]) -> Result<Vec<Vec<f32>>> {
            Ok(batch.iter().map(|_| vec![0.5]).collect())
        }

        fn num_classes(&self) -> usize { 2 }
    }

    #[test]
    fn rejects_rows_of_the_wrong_width() {
        let err = evaluate(&Narrow, &[0, 1], &[0, 1], 2).unwrap_err();
        assert!(err.to_string().contains("expected 2"));
    }

    #[test]
    fn rejects_row_count_mismatch() {
        let err = evaluate(&Broken, &[0, 1], &[0, 1], 2).unwrap_err();
        assert!(err.to_string().contains("1 rows for a batch of 2"));
    }
}
