// ============================================================
// Layer 4 — Data Errors
// ============================================================
// Typed failures for malformed files on disk. The application
// layer turns these into anyhow errors with path context.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("bad IDX magic number: expected {expected:#010x}, found {found:#010x}")]
    BadMagic { expected: u32, found: u32 },

    #[error("IDX payload truncated: header promises {expected} bytes, file holds {found}")]
    Truncated { expected: usize, found: usize },

    #[error("IDX header declares {count} images of {rows}x{cols}, more than can be addressed")]
    HeaderOverflow { count: usize, rows: usize, cols: usize },

    #[error("image count ({images}) does not match label count ({labels})")]
    CountMismatch { images: usize, labels: usize },

    #[error("unexpected image size {rows}x{cols}, expected 28x28")]
    ImageSize { rows: usize, cols: usize },

    #[error("archive tensor '{0}' is missing")]
    MissingTensor(String),

    #[error("archive tensor '{name}' has {found}, expected {expected}")]
    WrongLayout { name: String, expected: String, found: String },

    #[error("evaluation set is empty")]
    Empty,

    #[error("line {line}: {reason}")]
    BadRow { line: usize, reason: String },
}
