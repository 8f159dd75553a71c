// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between files on disk and tensor batches.
//
//   Digits:
//     IDX files / Burn downloader
//         │  idx.rs, mnist.rs
//         ▼
//     MnistSample (normalised) ──► MnistBatcher ──► [N,1,28,28]
//         │
//         ▼
//     archive.rs  (normalised test split, safetensors)
//
//   Sentiment:
//     SST-2 TSV ──► sst2.rs ──► encoding.rs ([CLS] .. [SEP] pad)
//         │
//         ▼
//     SentimentSample ──► SentimentBatcher ──► [N,L] ids + mask

/// Typed errors for malformed input files
pub mod error;

/// MNIST IDX binary format reader
pub mod idx;

/// MNIST samples, Burn Dataset and Batcher
pub mod mnist;

/// The normalised evaluation archive
pub mod archive;

/// GLUE SST-2 TSV reader
pub mod sst2;

/// Tokenisation and fixed-length framing
pub mod encoding;

/// Sentiment samples, Burn Dataset and Batcher
pub mod text_dataset;
