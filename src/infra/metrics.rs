// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per training epoch:
//
//   epoch,train_loss,eval_loss,eval_accuracy
//   1,0.183200,0.051100,0.983400
//
// The file lives next to the checkpoints (<dir>/metrics.csv)
// and is appended to across runs.

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};
use serde::{Deserialize, Serialize};

pub const CSV_HEADER: &str = "epoch,train_loss,eval_loss,eval_accuracy";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,

    /// Mean cross-entropy over the epoch's training batches
    pub train_loss: f64,

    /// Mean cross-entropy over the evaluation batches
    pub eval_loss: f64,

    /// Fraction of evaluation samples classified correctly, [0, 1]
    pub eval_accuracy: f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, eval_loss: f64, eval_accuracy: f64) -> Self {
        Self { epoch, train_loss, eval_loss, eval_accuracy }
    }

    /// True if this epoch beat the best eval loss seen so far
    pub fn is_improvement(&self, best_eval_loss: f64) -> bool {
        self.eval_loss < best_eval_loss
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the header only if the file is new.
    pub fn new(dir: impl Into<String>) -> Result<Self> {
        let dir = PathBuf::from(dir.into());
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{CSV_HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(
            f,
            "{},{:.6},{:.6},{:.6}",
            m.epoch, m.train_loss, m.eval_loss, m.eval_accuracy,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, eval_loss={:.4}",
            m.epoch, m.train_loss, m.eval_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_improvement() {
        let m = EpochMetrics::new(2, 2.5, 2.3, 0.2);
        assert!(m.is_improvement(3.0));
        assert!(!m.is_improvement(2.0));
    }

    #[test]
    fn appends_rows_after_single_header() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().to_string_lossy().to_string();

        let logger = MetricsLogger::new(&out).unwrap();
        logger.log(&EpochMetrics::new(1, 0.5, 0.4, 0.9)).unwrap();

        // A second logger on the same directory must not rewrite the header.
        let again = MetricsLogger::new(&out).unwrap();
        again.log(&EpochMetrics::new(2, 0.3, 0.35, 0.925)).unwrap();

        let csv = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines, vec![CSV_HEADER, "1,0.500000,0.400000,0.900000", "2,0.300000,0.350000,0.925000"]);
    }
}
