// ============================================================
// Layer 2 — Digit Classifier Use Cases
// ============================================================
// Three steps that only talk through files:
//
//   train  → data/mnist_cnn/ (checkpoint + configs)
//            data/mnist_test_normalized.safetensors
//   export → data/mnist_cnn.{json,mpk}
//   eval   → reads the archive and the bundle, reports accuracy
//
// Training runs on TrainBackend (GPU); export and evaluation
// run on the CPU backend.

use std::path::PathBuf;

use anyhow::Result;
use burn::{
    prelude::*,
    tensor::{backend::AutodiffBackend, Distribution},
};
use serde::{Deserialize, Serialize};

use crate::application::{train_device, TrainBackend};
use crate::data::{
    archive::NormalizedTestSet,
    mnist::{load_split, MnistDataset, MnistSource, MnistSplit, IMAGE_SIDE},
};
use crate::domain::normalization::Normalization;
use crate::infra::{
    checkpoint::{CheckpointManager, MODEL_CONFIG, TRAIN_CONFIG},
    export::{Dim, ExportBundle, ExportSpec, Manifest, ModelKind, TensorSpec},
    metrics::MetricsLogger,
};
use crate::ml::{
    cnn::{SimpleCnn, SimpleCnnConfig},
    evaluator::{evaluate, EvalReport},
    inferencer::{CpuBackend, MnistInferencer},
    trainer::{train_mnist, TrainReport},
};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MnistTrainConfig {
    pub data_dir:        String,
    pub output_dir:      String,
    pub archive_path:    String,
    pub epochs:          usize,
    pub batch_size:      usize,
    pub eval_batch_size: usize,
    pub lr:              f64,
    pub seed:            u64,
    pub num_workers:     usize,
    pub model:           SimpleCnnConfig,
}

impl Default for MnistTrainConfig {
    fn default() -> Self {
        Self {
            data_dir:        "data/mnist".to_string(),
            output_dir:      "data/mnist_cnn".to_string(),
            archive_path:    "data/mnist_test_normalized.safetensors".to_string(),
            epochs:          1,
            batch_size:      64,
            eval_batch_size: 256,
            lr:              1e-3,
            seed:            42,
            num_workers:     1,
            model:           SimpleCnnConfig::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MnistExportConfig {
    pub checkpoint_dir: String,
    pub bundle_stem:    String,
}

impl Default for MnistExportConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: "data/mnist_cnn".to_string(),
            bundle_stem:    "data/mnist_cnn".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MnistEvalConfig {
    pub archive_path: String,
    pub bundle_stem:  String,
    pub batch_size:   usize,
}

impl Default for MnistEvalConfig {
    fn default() -> Self {
        Self {
            archive_path: "data/mnist_test_normalized.safetensors".to_string(),
            bundle_stem:  "data/mnist_cnn".to_string(),
            batch_size:   256,
        }
    }
}

/// Tensor interface recorded in the manifest.
pub fn mnist_interface(num_classes: usize) -> (Vec<TensorSpec>, Vec<TensorSpec>) {
    let input = TensorSpec::new(
        "input",
        "f32",
        vec![Dim::dynamic("batch"), Dim::Fixed(1), Dim::Fixed(IMAGE_SIDE), Dim::Fixed(IMAGE_SIDE)],
    );
    let output = TensorSpec::new("logits", "f32", vec![Dim::dynamic("batch"), Dim::Fixed(num_classes)]);
    (vec![input], vec![output])
}

// ─── Train ───────────────────────────────────────────────────────────────────

pub struct MnistTrainUseCase {
    config: MnistTrainConfig,
}

impl MnistTrainUseCase {
    pub fn new(config: MnistTrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TrainReport> {
        self.run::<TrainBackend>(train_device())
    }

    pub fn run<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainReport> {
        let cfg  = &self.config;
        let norm = Normalization::MNIST;

        // ── Step 1: Load both splits, normalised ──────────────────────────────
        let source = MnistSource::resolve(&cfg.data_dir);
        let train  = load_split(&source, MnistSplit::Train, norm)?;
        let test   = load_split(&source, MnistSplit::Test, norm)?;
        tracing::info!("Loaded {} training and {} test images", train.len(), test.len());

        // ── Step 2: Archive the preprocessed test split ───────────────────────
        // Evaluation of the exported model reads exactly these tensors.
        NormalizedTestSet::from_samples(&test, norm).write(&PathBuf::from(&cfg.archive_path))?;

        // ── Step 3: Persist configs next to the checkpoints ───────────────────
        let ckpt = CheckpointManager::new(&cfg.output_dir);
        ckpt.save_config(TRAIN_CONFIG, cfg)?;
        ckpt.save_config(MODEL_CONFIG, &cfg.model)?;
        let metrics = MetricsLogger::new(&cfg.output_dir)?;

        // ── Step 4: Train ─────────────────────────────────────────────────────
        B::seed(cfg.seed);
        let model: SimpleCnn<B> = cfg.model.init(&device);
        let (_, report) = train_mnist(
            cfg, model,
            MnistDataset::new(train), MnistDataset::new(test),
            &ckpt, &metrics, device,
        )?;
        Ok(report)
    }
}

// ─── Export ──────────────────────────────────────────────────────────────────

pub struct MnistExportUseCase {
    config: MnistExportConfig,
}

impl MnistExportUseCase {
    pub fn new(config: MnistExportConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<Manifest> {
        let cfg    = &self.config;
        let device = Default::default();

        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir);
        let arch: SimpleCnnConfig = ckpt.load_config(MODEL_CONFIG)?;
        let model = ckpt.load_model::<CpuBackend, _>(arch.init::<CpuBackend>(&device), &device)?;
        let (inputs, outputs) = mnist_interface(arch.num_classes);

        // Trace-style smoke pass with a random image.
        let dummy  = Tensor::<CpuBackend, 4>::random([1, 1, IMAGE_SIDE, IMAGE_SIDE], Distribution::Normal(0.0, 1.0), &device);
        inputs[0].verify(&dummy.dims())?;
        let logits = model.forward(dummy);
        outputs[0].verify(&logits.dims())?;
        tracing::debug!("Dummy forward pass produced logits {:?}", logits.dims());

        ExportBundle::at(&cfg.bundle_stem).write::<CpuBackend, _, _>(
            &model,
            ExportSpec { kind: ModelKind::MnistCnn, architecture: &arch, inputs, outputs, max_len: None },
        )
    }
}

// ─── Evaluate ────────────────────────────────────────────────────────────────

pub struct MnistEvalOutcome {
    pub x_shape:  [usize; 4],
    pub y_len:    usize,
    pub manifest: Manifest,
    pub report:   EvalReport,
}

pub struct MnistEvalUseCase {
    config: MnistEvalConfig,
}

impl MnistEvalUseCase {
    pub fn new(config: MnistEvalConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<MnistEvalOutcome> {
        let cfg = &self.config;

        let archive = NormalizedTestSet::read(&PathBuf::from(&cfg.archive_path))?;
        if archive.norm != Normalization::MNIST {
            tracing::warn!(
                "Archive was normalised with mean={} std={}, not the MNIST constants",
                archive.norm.mean, archive.norm.std,
            );
        }

        let bundle = ExportBundle::at(&cfg.bundle_stem);
        let (inferencer, manifest) = MnistInferencer::<CpuBackend>::from_bundle(&bundle, Default::default())?;

        let inputs: Vec<Vec<f32>> = (0..archive.len()).map(|i| archive.image(i).to_vec()).collect();
        let labels: Vec<usize>    = archive.labels.iter().map(|&y| y as usize).collect();

        let report = evaluate(&inferencer, &inputs, &labels, cfg.batch_size)?;
        tracing::info!("{} / {} test images classified correctly", report.correct, report.total);

        Ok(MnistEvalOutcome { x_shape: archive.x_shape(), y_len: labels.len(), manifest, report })
    }
}
