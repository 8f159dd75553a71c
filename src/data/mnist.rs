// ============================================================
// Layer 4 — MNIST Dataset and Batcher
// ============================================================
// Turns the raw IDX bytes (or Burn's downloaded copy) into
// normalised samples, then stacks them into tensors:
//
//   images:  [N, 1, 28, 28]  float, normalised
//   targets: [N]             int, digit 0..9
//
// Two sources are supported:
//   - a local directory holding the four uncompressed IDX files
//   - Burn's MnistDataset, which downloads and caches the data
//     on first use

use std::path::PathBuf;

use anyhow::Result;
use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    prelude::*,
};

use crate::data::{error::DataError, idx};
use crate::domain::normalization::Normalization;

pub const IMAGE_SIDE:   usize = 28;
pub const IMAGE_PIXELS: usize = IMAGE_SIDE * IMAGE_SIDE;
pub const NUM_CLASSES:  usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MnistSplit {
    Train,
    Test,
}

#[derive(Debug, Clone)]
pub enum MnistSource {
    /// Directory with uncompressed IDX files
    Idx(PathBuf),
    /// Burn's downloading dataset (cached under the user's home)
    Download,
}

impl MnistSource {
    /// Use the IDX directory when it holds the files, otherwise download.
    pub fn resolve(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if dir.join(idx::TRAIN_IMAGES).exists() && dir.join(idx::TEST_IMAGES).exists() {
            MnistSource::Idx(dir)
        } else {
            MnistSource::Download
        }
    }
}

/// One normalised 28x28 image with its digit label.
#[derive(Debug, Clone, PartialEq)]
pub struct MnistSample {
    pub pixels: Vec<f32>,
    pub label:  u8,
}

pub fn load_split(source: &MnistSource, split: MnistSplit, norm: Normalization) -> Result<Vec<MnistSample>> {
    match source {
        MnistSource::Idx(dir) => {
            let (images, labels) = match split {
                MnistSplit::Train => (idx::TRAIN_IMAGES, idx::TRAIN_LABELS),
                MnistSplit::Test  => (idx::TEST_IMAGES,  idx::TEST_LABELS),
            };
            tracing::info!("Reading {:?} split from '{}'", split, dir.display());
            let (images, labels) = idx::read_pair(&dir.join(images), &dir.join(labels))?;
            Ok(samples_from_idx(&images, &labels, norm)?)
        }
        MnistSource::Download => {
            use burn::data::dataset::vision::MnistDataset as BurnMnist;

            tracing::info!("Fetching {:?} split through Burn's MNIST downloader", split);
            let burn_ds = match split {
                MnistSplit::Train => BurnMnist::train(),
                MnistSplit::Test  => BurnMnist::test(),
            };
            Ok(burn_ds
                .iter()
                .map(|item| MnistSample {
                    pixels: item.image.iter().flatten().map(|&p| norm.apply_f32(p)).collect(),
                    label:  item.label,
                })
                .collect())
        }
    }
}

pub fn samples_from_idx(images: &idx::IdxImages, labels: &[u8], norm: Normalization) -> Result<Vec<MnistSample>, DataError> {
    if images.rows != IMAGE_SIDE || images.cols != IMAGE_SIDE {
        return Err(DataError::ImageSize { rows: images.rows, cols: images.cols });
    }
    if images.count() != labels.len() {
        return Err(DataError::CountMismatch { images: images.count(), labels: labels.len() });
    }
    Ok(labels
        .iter()
        .enumerate()
        .map(|(i, &label)| MnistSample {
            pixels: images.image(i).iter().map(|&p| norm.apply(p)).collect(),
            label,
        })
        .collect())
}

pub struct MnistDataset {
    samples: Vec<MnistSample>,
}

impl MnistDataset {
    pub fn new(samples: Vec<MnistSample>) -> Self { Self { samples } }
}

impl Dataset<MnistSample> for MnistDataset {
    fn get(&self, index: usize) -> Option<MnistSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

#[derive(Debug, Clone)]
pub struct MnistBatch<B: Backend> {
    /// [batch_size, 1, 28, 28]
    pub images:  Tensor<B, 4>,
    /// [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

#[derive(Clone, Debug)]
pub struct MnistBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> MnistBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

/// Stack flat normalised pixel rows into an NCHW image tensor.
pub fn images_tensor<B: Backend>(rows: &[&[f32]], device: &B::Device) -> Tensor<B, 4> {
    let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    Tensor::<B, 1>::from_floats(flat.as_slice(), device)
        .reshape([rows.len(), 1, IMAGE_SIDE, IMAGE_SIDE])
}

impl<B: Backend> Batcher<MnistSample, MnistBatch<B>> for MnistBatcher<B> {
    fn batch(&self, items: Vec<MnistSample>) -> MnistBatch<B> {
        let rows: Vec<&[f32]> = items.iter().map(|s| s.pixels.as_slice()).collect();
        let images = images_tensor::<B>(&rows, &self.device);

        let labels: Vec<i32> = items.iter().map(|s| s.label as i32).collect();
        let targets = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        MnistBatch { images, targets }
    }
}
