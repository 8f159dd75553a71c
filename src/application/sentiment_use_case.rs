// ============================================================
// Layer 2 — Sentence Classifier Use Cases
// ============================================================
// Fine-tune a pretrained BERT encoder on SST-2, then hand the
// result to the other steps through files:
//
//   train  → data/bert-sst2/ (checkpoint, configs, tokenizer.json)
//   export → data/bert-sst2.{json,mpk}
//   check  → validates the bundle and classifies fixed sentences
//   eval   → bundle accuracy over an SST-2 TSV split

use std::path::PathBuf;

use anyhow::{bail, Result};
use burn::tensor::backend::AutodiffBackend;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::application::{train_device, TrainBackend};
use crate::data::{
    encoding::{EncodedText, TextEncoder, DEFAULT_MAX_LEN},
    sst2::{load_tsv, LabelledSentence},
    text_dataset::{text_tensors, SentimentDataset, SentimentSample},
};
use crate::domain::{label::SentimentLabel, prediction::Prediction};
use crate::infra::{
    checkpoint::{CheckpointManager, MODEL_CONFIG, TRAIN_CONFIG},
    export::{Dim, ExportBundle, ExportSpec, Manifest, ModelKind, TensorSpec},
    metrics::MetricsLogger,
    pretrained::PretrainedDir,
    tokenizer_store::TokenizerStore,
};
use crate::ml::{
    bert::{BertClassifier, BertConfig},
    evaluator::{evaluate, EvalReport},
    inferencer::{CpuBackend, SentimentInferencer},
    trainer::{train_sentiment, TrainReport},
};

/// Sentences classified by `bert check`.
pub const CHECK_SENTENCES: [&str; 5] = [
    "This movie is great!",
    "This movie is terrible.",
    "I really loved this film.",
    "I really hated this film.",
    "The plot was boring and slow.",
];

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentTrainConfig {
    pub pretrained_dir:  String,
    pub train_file:      String,
    pub eval_file:       String,
    pub output_dir:      String,
    /// Leading rows kept from each split; 0 keeps all of them
    pub train_samples:   usize,
    pub eval_samples:    usize,
    pub max_len:         usize,
    pub epochs:          usize,
    pub batch_size:      usize,
    pub eval_batch_size: usize,
    pub lr:              f64,
    pub logging_steps:   usize,
    pub seed:            u64,
    pub num_workers:     usize,
}

impl Default for SentimentTrainConfig {
    fn default() -> Self {
        Self {
            pretrained_dir:  "data/bert-base-uncased".to_string(),
            train_file:      "data/sst2/train.tsv".to_string(),
            eval_file:       "data/sst2/dev.tsv".to_string(),
            output_dir:      "data/bert-sst2".to_string(),
            train_samples:   500,
            eval_samples:    125,
            max_len:         DEFAULT_MAX_LEN,
            epochs:          1,
            batch_size:      16,
            eval_batch_size: 16,
            lr:              5e-5,
            logging_steps:   50,
            seed:            42,
            num_workers:     1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SentimentExportConfig {
    pub model_dir:   String,
    pub bundle_stem: String,
}

impl Default for SentimentExportConfig {
    fn default() -> Self {
        Self {
            model_dir:   "data/bert-sst2".to_string(),
            bundle_stem: "data/bert-sst2".to_string(),
        }
    }
}

/// Shared by `check` and `eval`: where the bundle and its tokenizer live.
#[derive(Debug, Clone)]
pub struct SentimentBundleConfig {
    pub model_dir:   String,
    pub bundle_stem: String,
    /// Overrides the sequence length recorded in the manifest
    pub max_len:     Option<usize>,
}

impl Default for SentimentBundleConfig {
    fn default() -> Self {
        Self {
            model_dir:   "data/bert-sst2".to_string(),
            bundle_stem: "data/bert-sst2".to_string(),
            max_len:     None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SentimentEvalConfig {
    pub bundle:     SentimentBundleConfig,
    pub eval_file:  String,
    /// 0 evaluates every row
    pub limit:      usize,
    pub batch_size: usize,
}

impl Default for SentimentEvalConfig {
    fn default() -> Self {
        Self {
            bundle:     SentimentBundleConfig::default(),
            eval_file:  "data/sst2/dev.tsv".to_string(),
            limit:      0,
            batch_size: 16,
        }
    }
}

pub fn sentiment_interface(num_labels: usize) -> (Vec<TensorSpec>, Vec<TensorSpec>) {
    let token_dims = || vec![Dim::dynamic("batch_size"), Dim::dynamic("seq_len")];
    let inputs = vec![
        TensorSpec::new("input_ids", "i64", token_dims()),
        TensorSpec::new("attention_mask", "i64", token_dims()),
    ];
    let outputs = vec![TensorSpec::new("logits", "f32", vec![Dim::dynamic("batch_size"), Dim::Fixed(num_labels)])];
    (inputs, outputs)
}

fn row_limit(n: usize) -> Option<usize> {
    (n > 0).then_some(n)
}

fn encode_rows(encoder: &TextEncoder, rows: &[LabelledSentence]) -> Result<Vec<SentimentSample>> {
    rows.iter()
        .map(|row| Ok(SentimentSample { encoded: encoder.encode(&row.sentence)?, label: row.label.index() }))
        .collect()
}

/// Explicit request, else the length the bundle was trained with, else the default.
fn sequence_length(requested: Option<usize>, manifest: &Manifest) -> usize {
    requested.or(manifest.max_len).unwrap_or(DEFAULT_MAX_LEN)
}

/// Load the exported bundle with the tokenizer saved by training.
fn open_bundle(cfg: &SentimentBundleConfig) -> Result<(SentimentInferencer<CpuBackend>, Manifest)> {
    let bundle    = ExportBundle::at(&cfg.bundle_stem);
    let max_len   = sequence_length(cfg.max_len, &bundle.read_manifest()?);
    let tokenizer = TokenizerStore::new(&cfg.model_dir).load()?;
    let encoder   = TextEncoder::new(tokenizer, max_len)?;
    tracing::debug!("Encoding sentences to {} tokens", max_len);
    SentimentInferencer::from_bundle(&bundle, encoder, Default::default())
}

// ─── Train ───────────────────────────────────────────────────────────────────

pub struct SentimentTrainUseCase {
    config: SentimentTrainConfig,
}

impl SentimentTrainUseCase {
    pub fn new(config: SentimentTrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TrainReport> {
        self.run::<TrainBackend>(train_device())
    }

    pub fn run<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainReport> {
        let cfg = &self.config;

        // ── Step 1: Pretrained tokenizer and architecture ─────────────────────
        let pretrained = PretrainedDir::new(&cfg.pretrained_dir);
        let encoder    = TextEncoder::new(pretrained.tokenizer()?, cfg.max_len)?;
        let bert_cfg   = pretrained.config(SentimentLabel::ALL.len())?;
        if cfg.max_len > bert_cfg.max_position_embeddings {
            bail!(
                "max_len {} exceeds the encoder's {} position embeddings",
                cfg.max_len, bert_cfg.max_position_embeddings
            );
        }
        if encoder.vocab_size() > bert_cfg.vocab_size {
            bail!(
                "tokenizer has {} tokens but the encoder embeds only {}",
                encoder.vocab_size(), bert_cfg.vocab_size
            );
        }

        // ── Step 2: Load and tokenise the SST-2 subsets ───────────────────────
        let train_rows = load_tsv(&PathBuf::from(&cfg.train_file), row_limit(cfg.train_samples))?;
        let eval_rows  = load_tsv(&PathBuf::from(&cfg.eval_file), row_limit(cfg.eval_samples))?;
        let train = encode_rows(&encoder, &train_rows)?;
        let eval  = encode_rows(&encoder, &eval_rows)?;
        tracing::info!("Tokenised {} training and {} evaluation sentences", train.len(), eval.len());

        // ── Step 3: Encoder weights + fresh classification head ───────────────
        B::seed(cfg.seed);
        let bert  = pretrained.load_encoder(bert_cfg.init_encoder::<B>(&device), &device)?;
        let model: BertClassifier<B> = bert_cfg.with_encoder(bert, &device);

        // ── Step 4: Persist everything export and check will need ─────────────
        let ckpt = CheckpointManager::new(&cfg.output_dir);
        ckpt.save_config(TRAIN_CONFIG, cfg)?;
        ckpt.save_config(MODEL_CONFIG, &bert_cfg)?;
        TokenizerStore::new(ckpt.dir()).save(encoder.tokenizer())?;
        let metrics = MetricsLogger::new(&cfg.output_dir)?;

        // ── Step 5: Fine-tune ─────────────────────────────────────────────────
        let (_, report) = train_sentiment(
            cfg, model,
            SentimentDataset::new(train), SentimentDataset::new(eval),
            &ckpt, &metrics, device,
        )?;
        Ok(report)
    }
}

// ─── Export ──────────────────────────────────────────────────────────────────

pub struct SentimentExportUseCase {
    config: SentimentExportConfig,
}

impl SentimentExportUseCase {
    pub fn new(config: SentimentExportConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<Manifest> {
        let cfg    = &self.config;
        let device = Default::default();

        let ckpt = CheckpointManager::new(&cfg.model_dir);
        let arch: BertConfig = ckpt.load_config(MODEL_CONFIG)?;
        let train_cfg: SentimentTrainConfig = ckpt.load_config(TRAIN_CONFIG)?;
        let model = ckpt.load_model::<CpuBackend, _>(arch.init::<CpuBackend>(&device), &device)?;
        let (inputs, outputs) = sentiment_interface(arch.num_labels);

        // Trace-style smoke pass: random ids below the vocabulary size, no padding.
        let mut rng = StdRng::seed_from_u64(train_cfg.seed);
        let seq_len = train_cfg.max_len;
        let dummy = EncodedText {
            input_ids:      (0..seq_len).map(|_| rng.gen_range(0..arch.vocab_size as u32)).collect(),
            attention_mask: vec![1; seq_len],
        };
        let (input_ids, attention_mask) = text_tensors::<CpuBackend>(&[&dummy], &device);
        inputs[0].verify(&input_ids.dims())?;
        inputs[1].verify(&attention_mask.dims())?;
        let logits = model.forward(input_ids, attention_mask);
        outputs[0].verify(&logits.dims())?;
        tracing::debug!("Dummy forward pass produced logits {:?}", logits.dims());

        ExportBundle::at(&cfg.bundle_stem).write::<CpuBackend, _, _>(
            &model,
            ExportSpec {
                kind:         ModelKind::BertClassifier,
                architecture: &arch,
                inputs,
                outputs,
                max_len:      Some(train_cfg.max_len),
            },
        )
    }
}

// ─── Check ───────────────────────────────────────────────────────────────────

pub struct SentenceCheck {
    pub text:       String,
    pub prediction: Prediction,
}

impl SentenceCheck {
    pub fn label(&self) -> Option<SentimentLabel> {
        SentimentLabel::from_index(self.prediction.class_index)
    }
}

pub struct CheckOutcome {
    pub manifest:  Manifest,
    pub sentences: Vec<SentenceCheck>,
}

pub struct SentimentCheckUseCase {
    config: SentimentBundleConfig,
}

impl SentimentCheckUseCase {
    pub fn new(config: SentimentBundleConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<CheckOutcome> {
        let (inferencer, manifest) = open_bundle(&self.config)?;

        let sentences = CHECK_SENTENCES
            .iter()
            .map(|&text| Ok(SentenceCheck { text: text.to_string(), prediction: inferencer.predict(text)? }))
            .collect::<Result<Vec<_>>>()?;

        Ok(CheckOutcome { manifest, sentences })
    }
}

// ─── Evaluate ────────────────────────────────────────────────────────────────

pub struct SentimentEvalUseCase {
    config: SentimentEvalConfig,
}

impl SentimentEvalUseCase {
    pub fn new(config: SentimentEvalConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<EvalReport> {
        let cfg = &self.config;
        let (inferencer, _) = open_bundle(&cfg.bundle)?;

        let rows   = load_tsv(&PathBuf::from(&cfg.eval_file), row_limit(cfg.limit))?;
        let inputs = inferencer.encoder().encode_all(rows.iter().map(|r| r.sentence.as_str()))?;
        let labels: Vec<usize> = rows.iter().map(|r| r.label.index()).collect();

        let report = evaluate(&inferencer, &inputs, &labels, cfg.batch_size)?;
        tracing::info!("{} / {} sentences classified correctly", report.correct, report.total);
        Ok(report)
    }
}
