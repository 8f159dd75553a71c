// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Two command groups, one subcommand per pipeline step:
//
//   mnist train | export | eval
//   bert  train | export | check | eval
//
// Every flag defaults to the path or constant the step uses when
// run without arguments, so the steps chain with no flags at all.

use clap::{Args, Subcommand};

use crate::application::{
    mnist_use_case::{MnistEvalConfig, MnistExportConfig, MnistTrainConfig},
    sentiment_use_case::{SentimentBundleConfig, SentimentEvalConfig, SentimentExportConfig, SentimentTrainConfig},
};
use crate::ml::cnn::SimpleCnnConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Handwritten digit classifier (CNN on MNIST)
    #[command(subcommand)]
    Mnist(MnistCommand),

    /// Sentence sentiment classifier (BERT fine-tuned on SST-2)
    #[command(subcommand)]
    Bert(BertCommand),
}

#[derive(Subcommand, Debug)]
pub enum MnistCommand {
    /// Train the CNN and archive the normalised test split
    Train(MnistTrainArgs),

    /// Export the trained CNN to a portable bundle
    Export(MnistExportArgs),

    /// Evaluate the exported bundle on the archived test split
    Eval(MnistEvalArgs),
}

#[derive(Subcommand, Debug)]
pub enum BertCommand {
    /// Fine-tune a pretrained encoder on SST-2
    Train(BertTrainArgs),

    /// Export the fine-tuned classifier to a portable bundle
    Export(BertExportArgs),

    /// Validate the bundle and classify a few fixed sentences
    Check(BertBundleArgs),

    /// Accuracy of the exported bundle on an SST-2 split
    Eval(BertEvalArgs),
}

// ─── mnist ────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct MnistTrainArgs {
    /// Directory with the uncompressed IDX files; downloaded when missing
    #[arg(long, default_value = "data/mnist")]
    pub data_dir: String,

    /// Where checkpoints, configs and metrics.csv are written
    #[arg(long, default_value = "data/mnist_cnn")]
    pub output_dir: String,

    /// Normalised test split written for the evaluation step
    #[arg(long, default_value = "data/mnist_test_normalized.safetensors")]
    pub archive_path: String,

    #[arg(long, default_value_t = 1)]
    pub epochs: usize,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    /// Batch size for the held-out split
    #[arg(long, default_value_t = 256)]
    pub eval_batch_size: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Seeds weight init and shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// DataLoader worker threads
    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,
}

impl From<MnistTrainArgs> for MnistTrainConfig {
    fn from(a: MnistTrainArgs) -> Self {
        MnistTrainConfig {
            data_dir:        a.data_dir,
            output_dir:      a.output_dir,
            archive_path:    a.archive_path,
            epochs:          a.epochs,
            batch_size:      a.batch_size,
            eval_batch_size: a.eval_batch_size,
            lr:              a.lr,
            seed:            a.seed,
            num_workers:     a.num_workers,
            model:           SimpleCnnConfig::new(),
        }
    }
}

#[derive(Args, Debug)]
pub struct MnistExportArgs {
    /// Training output directory
    #[arg(long, default_value = "data/mnist_cnn")]
    pub checkpoint_dir: String,

    /// Bundle path without extension; writes <stem>.json and <stem>.mpk
    #[arg(long, default_value = "data/mnist_cnn")]
    pub bundle: String,
}

impl From<MnistExportArgs> for MnistExportConfig {
    fn from(a: MnistExportArgs) -> Self {
        MnistExportConfig { checkpoint_dir: a.checkpoint_dir, bundle_stem: a.bundle }
    }
}

#[derive(Args, Debug)]
pub struct MnistEvalArgs {
    #[arg(long, default_value = "data/mnist_test_normalized.safetensors")]
    pub archive_path: String,

    /// Bundle path without extension
    #[arg(long, default_value = "data/mnist_cnn")]
    pub bundle: String,

    /// Images per forward pass; 1 evaluates sample by sample
    #[arg(long, default_value_t = 256)]
    pub batch_size: usize,
}

impl From<MnistEvalArgs> for MnistEvalConfig {
    fn from(a: MnistEvalArgs) -> Self {
        MnistEvalConfig { archive_path: a.archive_path, bundle_stem: a.bundle, batch_size: a.batch_size }
    }
}

// ─── bert ─────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct BertTrainArgs {
    /// Pretrained model directory (config.json, tokenizer.json, pytorch_model.bin)
    #[arg(long, default_value = "data/bert-base-uncased")]
    pub pretrained_dir: String,

    /// SST-2 training split (sentence<TAB>label with a header row)
    #[arg(long, default_value = "data/sst2/train.tsv")]
    pub train_file: String,

    /// SST-2 validation split
    #[arg(long, default_value = "data/sst2/dev.tsv")]
    pub eval_file: String,

    #[arg(long, default_value = "data/bert-sst2")]
    pub output_dir: String,

    /// Leading training rows to use; 0 uses the whole split
    #[arg(long, default_value_t = 500)]
    pub train_samples: usize,

    /// Leading validation rows to use; 0 uses the whole split
    #[arg(long, default_value_t = 125)]
    pub eval_samples: usize,

    /// Tokens per sequence including [CLS] and [SEP]
    #[arg(long, default_value_t = 128)]
    pub max_len: usize,

    #[arg(long, default_value_t = 1)]
    pub epochs: usize,

    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 16)]
    pub eval_batch_size: usize,

    /// Peak learning rate, decayed linearly to zero
    #[arg(long, default_value_t = 5e-5)]
    pub lr: f64,

    /// Log the running loss every N optimiser steps
    #[arg(long, default_value_t = 50)]
    pub logging_steps: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,
}

impl From<BertTrainArgs> for SentimentTrainConfig {
    fn from(a: BertTrainArgs) -> Self {
        SentimentTrainConfig {
            pretrained_dir:  a.pretrained_dir,
            train_file:      a.train_file,
            eval_file:       a.eval_file,
            output_dir:      a.output_dir,
            train_samples:   a.train_samples,
            eval_samples:    a.eval_samples,
            max_len:         a.max_len,
            epochs:          a.epochs,
            batch_size:      a.batch_size,
            eval_batch_size: a.eval_batch_size,
            lr:              a.lr,
            logging_steps:   a.logging_steps,
            seed:            a.seed,
            num_workers:     a.num_workers,
        }
    }
}

#[derive(Args, Debug)]
pub struct BertExportArgs {
    /// Fine-tuned model directory
    #[arg(long, default_value = "data/bert-sst2")]
    pub model_dir: String,

    /// Bundle path without extension
    #[arg(long, default_value = "data/bert-sst2")]
    pub bundle: String,
}

impl From<BertExportArgs> for SentimentExportConfig {
    fn from(a: BertExportArgs) -> Self {
        SentimentExportConfig { model_dir: a.model_dir, bundle_stem: a.bundle }
    }
}

#[derive(Args, Debug)]
pub struct BertBundleArgs {
    /// Directory holding the tokenizer saved by training
    #[arg(long, default_value = "data/bert-sst2")]
    pub model_dir: String,

    /// Bundle path without extension
    #[arg(long, default_value = "data/bert-sst2")]
    pub bundle: String,

    /// Tokens per sequence; defaults to the length recorded at export
    #[arg(long)]
    pub max_len: Option<usize>,
}

impl From<BertBundleArgs> for SentimentBundleConfig {
    fn from(a: BertBundleArgs) -> Self {
        SentimentBundleConfig { model_dir: a.model_dir, bundle_stem: a.bundle, max_len: a.max_len }
    }
}

#[derive(Args, Debug)]
pub struct BertEvalArgs {
    #[command(flatten)]
    pub bundle: BertBundleArgs,

    #[arg(long, default_value = "data/sst2/dev.tsv")]
    pub eval_file: String,

    /// Leading rows to evaluate; 0 evaluates the whole file
    #[arg(long, default_value_t = 0)]
    pub limit: usize,

    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,
}

impl From<BertEvalArgs> for SentimentEvalConfig {
    fn from(a: BertEvalArgs) -> Self {
        SentimentEvalConfig {
            bundle:     a.bundle.into(),
            eval_file:  a.eval_file,
            limit:      a.limit,
            batch_size: a.batch_size,
        }
    }
}
