// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Filesystem-facing concerns used by the use cases:
//
//   checkpoint.rs      — per-epoch weights + configs (training)
//   export.rs          — the portable bundle (hand-off format)
//   metrics.rs         — per-epoch CSV metrics
//   tokenizer_store.rs — tokenizer.json load/save
//   pretrained.rs      — HuggingFace config + weight import

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Portable weights + manifest bundle
pub mod export;

/// Training metrics CSV logger
pub mod metrics;

/// Pretrained BERT directory access
pub mod pretrained;

/// Tokenizer saving and loading
pub mod tokenizer_store;
