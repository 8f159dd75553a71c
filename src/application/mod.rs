// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// One use case per pipeline step. Each reads its inputs from
// disk, drives the lower layers and writes its outputs to disk;
// steps never call each other.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1); use cases return
//     reports and the CLI formats them
//   - Only workflow coordination

use burn::backend::{wgpu::WgpuDevice, Autodiff, Wgpu};

/// Backend used by both training steps.
pub type TrainBackend = Autodiff<Wgpu>;

pub fn train_device() -> WgpuDevice {
    WgpuDevice::default()
}

/// Digit classifier: train, export, evaluate
pub mod mnist_use_case;

/// Sentence classifier: train, export, check, evaluate
pub mod sentiment_use_case;
