// ============================================================
// Layer 6 — Pretrained Encoder Import
// ============================================================
// A pretrained model directory (e.g. bert-base-uncased) holds:
//
//   config.json        — architecture (HuggingFace field names)
//   tokenizer.json     — WordPiece vocabulary
//   pytorch_model.bin  — encoder weights
//
// Weights are read with burn-import's PyTorchFileRecorder. Its
// adapter transposes Linear weights and renames LayerNorm
// weight/bias to gamma/beta; the key remaps below map the
// checkpoint's module paths onto BertEncoder's field names.
// Keys with no counterpart (pretraining heads, position_ids
// buffers) are ignored. The classification head is always
// freshly initialised.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, Recorder},
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use serde::Deserialize;
use tokenizers::Tokenizer;

use crate::infra::tokenizer_store::TokenizerStore;
use crate::ml::bert::{BertConfig, BertEncoder, BertEncoderRecord};

pub const CONFIG_FILE:  &str = "config.json";
pub const WEIGHTS_FILE: &str = "pytorch_model.bin";

/// Checkpoint key → BertEncoder field path, applied in order.
pub const KEY_REMAP: [(&str, &str); 12] = [
    (r"^bert\.", ""),
    (r"\.gamma$", ".weight"),
    (r"\.beta$", ".bias"),
    (r"^encoder\.layer\.([0-9]+)\.", "layers.$1."),
    (r"attention\.self\.", "attention."),
    (r"attention\.output\.LayerNorm", "attention_norm"),
    (r"attention\.output\.dense", "attention.output"),
    (r"\.output\.LayerNorm", ".output_norm"),
    (r"\.output\.dense", ".output"),
    (r"intermediate\.dense", "intermediate"),
    (r"embeddings\.LayerNorm", "embeddings.layer_norm"),
    (r"^pooler\.dense", "pooler"),
];

/// The subset of a HuggingFace BERT config.json this crate uses.
#[derive(Debug, Clone, Deserialize)]
struct HfBertConfig {
    vocab_size:              usize,
    hidden_size:             usize,
    num_hidden_layers:       usize,
    num_attention_heads:     usize,
    intermediate_size:       usize,
    max_position_embeddings: usize,
    #[serde(default = "default_type_vocab")]
    type_vocab_size: usize,
    #[serde(default = "default_eps")]
    layer_norm_eps: f64,
    #[serde(default = "default_dropout")]
    hidden_dropout_prob: f64,
    #[serde(default = "default_dropout")]
    attention_probs_dropout_prob: f64,
    #[serde(default)]
    hidden_act: Option<String>,
}

fn default_type_vocab() -> usize { 2 }
fn default_eps() -> f64 { 1e-12 }
fn default_dropout() -> f64 { 0.1 }

impl HfBertConfig {
    fn into_bert_config(self, num_labels: usize) -> BertConfig {
        if let Some(act) = self.hidden_act.as_deref().filter(|a| *a != "gelu") {
            tracing::warn!("config.json asks for '{}' activation; GELU is used", act);
        }
        BertConfig::new(
            self.vocab_size,
            self.hidden_size,
            self.num_hidden_layers,
            self.num_attention_heads,
            self.intermediate_size,
            self.max_position_embeddings,
        )
        .with_type_vocab_size(self.type_vocab_size)
        .with_layer_norm_eps(self.layer_norm_eps)
        .with_hidden_dropout_prob(self.hidden_dropout_prob)
        .with_attention_probs_dropout_prob(self.attention_probs_dropout_prob)
        .with_num_labels(num_labels)
    }
}

pub fn parse_config(json: &str, num_labels: usize) -> Result<BertConfig> {
    let hf: HfBertConfig = serde_json::from_str(json).context("config.json is not a BERT config")?;
    Ok(hf.into_bert_config(num_labels))
}

pub struct PretrainedDir {
    dir: PathBuf,
}

impl PretrainedDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path { &self.dir }

    /// Architecture from config.json, or bert-base-uncased when absent.
    pub fn config(&self, num_labels: usize) -> Result<BertConfig> {
        let path = self.dir.join(CONFIG_FILE);
        if !path.exists() {
            tracing::warn!("No '{}'; assuming bert-base-uncased geometry", path.display());
            return Ok(BertConfig::base_uncased().with_num_labels(num_labels));
        }
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        parse_config(&json, num_labels).with_context(|| format!("In '{}'", path.display()))
    }

    pub fn tokenizer(&self) -> Result<Tokenizer> {
        let store = TokenizerStore::new(&self.dir);
        if !store.exists() {
            bail!("No '{}'; the pretrained directory must include its tokenizer", store.path().display());
        }
        store.load()
    }

    /// Load encoder weights into `encoder` if the directory has them.
    pub fn load_encoder<B: Backend>(&self, encoder: BertEncoder<B>, device: &B::Device) -> Result<BertEncoder<B>> {
        let path = self.dir.join(WEIGHTS_FILE);
        if !path.exists() {
            tracing::warn!("No '{}'; encoder starts from random weights", path.display());
            return Ok(encoder);
        }

        let args = KEY_REMAP
            .iter()
            .fold(LoadArgs::new(path.clone()), |args, (from, to)| args.with_key_remap(from, to));

        let record: BertEncoderRecord<B> = PyTorchFileRecorder::<FullPrecisionSettings>::default()
            .load(args, device)
            .with_context(|| format!("Cannot import encoder weights from '{}'", path.display()))?;

        tracing::info!("Imported pretrained encoder weights from '{}'", path.display());
        Ok(encoder.load_record(record))
    }
}
