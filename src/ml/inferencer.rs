// ============================================================
// Layer 5 — Inferencers
// ============================================================
// Load an exported bundle and answer "logits for this batch".
// Evaluation runs on the CPU backend; the training backend is
// never needed once a bundle exists.

use anyhow::{bail, Result};
use burn::prelude::*;

use crate::data::{
    encoding::{EncodedText, TextEncoder},
    mnist::images_tensor,
    text_dataset::text_tensors,
};
use crate::domain::{prediction::Prediction, traits::Classifier};
use crate::infra::export::{ExportBundle, Manifest, ModelKind};
use crate::ml::{
    bert::{BertClassifier, BertConfig},
    cnn::{SimpleCnn, SimpleCnnConfig},
    scoring::{argmax, softmax},
};

pub type CpuBackend = burn::backend::NdArray;

/// Split a [batch, classes] logits tensor into one row per sample.
fn logits_rows<B: Backend>(logits: Tensor<B, 2>) -> Vec<Vec<f32>> {
    let [_, classes] = logits.dims();
    let flat: Vec<f32> = logits.into_data().iter::<f32>().collect();
    flat.chunks(classes.max(1)).map(<[f32]>::to_vec).collect()
}

pub struct MnistInferencer<B: Backend> {
    model:       SimpleCnn<B>,
    num_classes: usize,
    device:      B::Device,
}

impl<B: Backend> MnistInferencer<B> {
    pub fn new(model: SimpleCnn<B>, num_classes: usize, device: B::Device) -> Self {
        Self { model, num_classes, device }
    }

    pub fn from_bundle(bundle: &ExportBundle, device: B::Device) -> Result<(Self, Manifest)> {
        let manifest = bundle.check(ModelKind::MnistCnn)?;
        let cfg: SimpleCnnConfig = manifest.architecture()?;
        let model = bundle.load_weights::<B, _>(cfg.init::<B>(&device), &device)?;
        tracing::info!("Loaded digit classifier from '{}'", bundle.weights_path().display());
        Ok((Self::new(model, cfg.num_classes, device), manifest))
    }
}

impl<B: Backend> Classifier for MnistInferencer<B> {
    type Input = Vec<f32>;

    fn logits(&self, batch: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        let rows: Vec<&[f32]> = batch.iter().map(Vec::as_slice).collect();
        let images = images_tensor::<B>(&rows, &self.device);
        Ok(logits_rows(self.model.forward(images)))
    }

    fn num_classes(&self) -> usize { self.num_classes }
}

pub struct SentimentInferencer<B: Backend> {
    model:      BertClassifier<B>,
    encoder:    TextEncoder,
    num_labels: usize,
    device:     B::Device,
}

impl<B: Backend> SentimentInferencer<B> {
    pub fn new(model: BertClassifier<B>, encoder: TextEncoder, cfg: &BertConfig, device: B::Device) -> Result<Self> {
        if encoder.max_len() > cfg.max_position_embeddings {
            bail!(
                "max_len {} exceeds the model's {} position embeddings",
                encoder.max_len(), cfg.max_position_embeddings
            );
        }
        Ok(Self { model, encoder, num_labels: cfg.num_labels, device })
    }

    pub fn from_bundle(bundle: &ExportBundle, encoder: TextEncoder, device: B::Device) -> Result<(Self, Manifest)> {
        let manifest = bundle.check(ModelKind::BertClassifier)?;
        let cfg: BertConfig = manifest.architecture()?;
        let model = bundle.load_weights::<B, _>(cfg.init::<B>(&device), &device)?;
        tracing::info!("Loaded sentence classifier from '{}'", bundle.weights_path().display());
        Ok((Self::new(model, encoder, &cfg, device)?, manifest))
    }

    pub fn encoder(&self) -> &TextEncoder { &self.encoder }

    pub fn predict(&self, text: &str) -> Result<Prediction> {
        let encoded = self.encoder.encode(text)?;
        let logits = self.logits(std::slice::from_ref(&encoded))?
            .pop()
            .unwrap_or_default();
        let class_index = argmax(&logits).unwrap_or(0);
        let probabilities = softmax(&logits);
        Ok(Prediction { class_index, logits, probabilities })
    }
}

impl<B: Backend> Classifier for SentimentInferencer<B> {
    type Input = EncodedText;

    fn logits(&self, batch: &[EncodedText]) -> Result<Vec<Vec<f32>>> {
        let items: Vec<&EncodedText> = batch.iter().collect();
        let (input_ids, attention_mask) = text_tensors::<B>(&items, &self.device);
        Ok(logits_rows(self.model.forward(input_ids, attention_mask)))
    }

    fn num_classes(&self) -> usize { self.num_labels }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::encoding::tests::bert_like_tokenizer;
    use crate::ml::bert::tests::tiny_config;

    #[test]
    fn mnist_rows_match_batch() {
        let device = Default::default();
        let model: SimpleCnn<CpuBackend> = SimpleCnnConfig::new().init(&device);
        let inferencer = MnistInferencer::new(model, 10, device);

        let rows = inferencer.logits(&[vec![0.0; 784], vec![1.0; 784], vec![-1.0; 784]]).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.len() == 10));
    }

    #[test]
    fn sentiment_prediction_is_normalised() {
        let device = Default::default();
        let mut cfg = tiny_config();
        cfg.vocab_size = 7000;
        let model: BertClassifier<CpuBackend> = cfg.init(&device);
        let encoder = TextEncoder::new(bert_like_tokenizer(), 8).unwrap();
        let inferencer = SentimentInferencer::new(model, encoder, &cfg, device).unwrap();

        let p = inferencer.predict("This movie is terrible.").unwrap();
        assert_eq!(p.logits.len(), 2);
        assert!((p.probabilities.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert_eq!(Some(p.class_index), argmax(&p.logits));
    }

    #[test]
    fn rejects_sequences_longer_than_positions() {
        let device = Default::default();
        let cfg = tiny_config();
        let model: BertClassifier<CpuBackend> = cfg.init(&device);
        let encoder = TextEncoder::new(bert_like_tokenizer(), 64).unwrap();
        assert!(SentimentInferencer::new(model, encoder, &cfg, device).is_err());
    }
}
