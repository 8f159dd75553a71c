// ============================================================
// Layer 4 — Sentiment Dataset and Batcher
// ============================================================
// Every sample is already framed to the same length, so the
// batcher only flattens and reshapes:
//
//   input_ids:      [N, L]  int
//   attention_mask: [N, L]  int (1 = token, 0 = padding)
//   labels:         [N]     int (0 = negative, 1 = positive)

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    prelude::*,
};

use crate::data::encoding::EncodedText;

#[derive(Debug, Clone, PartialEq)]
pub struct SentimentSample {
    pub encoded: EncodedText,
    pub label:   usize,
}

pub struct SentimentDataset {
    samples: Vec<SentimentSample>,
}

impl SentimentDataset {
    pub fn new(samples: Vec<SentimentSample>) -> Self { Self { samples } }
}

impl Dataset<SentimentSample> for SentimentDataset {
    fn get(&self, index: usize) -> Option<SentimentSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

#[derive(Debug, Clone)]
pub struct SentimentBatch<B: Backend> {
    pub input_ids:      Tensor<B, 2, Int>,
    pub attention_mask: Tensor<B, 2, Int>,
    pub labels:         Tensor<B, 1, Int>,
}

#[derive(Clone, Debug)]
pub struct SentimentBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> SentimentBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

/// Stack framed sequences into `(input_ids, attention_mask)`, both [N, L].
pub fn text_tensors<B: Backend>(items: &[&EncodedText], device: &B::Device) -> (Tensor<B, 2, Int>, Tensor<B, 2, Int>) {
    let batch_size = items.len();
    let seq_len    = items.first().map(|e| e.len()).unwrap_or(0);

    let ids: Vec<i32> = items
        .iter()
        .flat_map(|e| e.input_ids.iter().map(|&x| x as i32))
        .collect();
    let mask: Vec<i32> = items
        .iter()
        .flat_map(|e| e.attention_mask.iter().map(|&x| x as i32))
        .collect();

    let input_ids = Tensor::<B, 1, Int>::from_ints(ids.as_slice(), device)
        .reshape([batch_size, seq_len]);
    let attention_mask = Tensor::<B, 1, Int>::from_ints(mask.as_slice(), device)
        .reshape([batch_size, seq_len]);
    (input_ids, attention_mask)
}

impl<B: Backend> Batcher<SentimentSample, SentimentBatch<B>> for SentimentBatcher<B> {
    fn batch(&self, items: Vec<SentimentSample>) -> SentimentBatch<B> {
        let encoded: Vec<&EncodedText> = items.iter().map(|s| &s.encoded).collect();
        let (input_ids, attention_mask) = text_tensors::<B>(&encoded, &self.device);

        let labels: Vec<i32> = items.iter().map(|s| s.label as i32).collect();
        let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        SentimentBatch { input_ids, attention_mask, labels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::encoding::{frame, SpecialTokens};
    use burn::backend::NdArray;

    #[test]
    fn batch_shapes_and_contents() {
        let samples = vec![
            SentimentSample { encoded: frame(&[5, 6], SpecialTokens::BERT, 6), label: 1 },
            SentimentSample { encoded: frame(&[9],    SpecialTokens::BERT, 6), label: 0 },
        ];
        let batch = SentimentBatcher::<NdArray>::new(Default::default()).batch(samples);

        assert_eq!(batch.input_ids.dims(), [2, 6]);
        assert_eq!(batch.attention_mask.dims(), [2, 6]);

        let ids: Vec<i64> = batch.input_ids.into_data().iter::<i64>().collect();
        assert_eq!(ids, vec![101, 5, 6, 102, 0, 0, 101, 9, 102, 0, 0, 0]);

        let mask: Vec<i64> = batch.attention_mask.into_data().iter::<i64>().collect();
        assert_eq!(mask.iter().sum::<i64>(), 4 + 3);

        let labels: Vec<i64> = batch.labels.into_data().iter::<i64>().collect();
        assert_eq!(labels, vec![1, 0]);
    }
}
