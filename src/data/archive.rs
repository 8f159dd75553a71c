// ============================================================
// Layer 4 — Normalised Test-Set Archive
// ============================================================
// The preprocessed evaluation split is written once after
// training and read once by the evaluator. It is a single
// safetensors file, readable from any language:
//
//   x     f32  [N, 1, 28, 28]   normalised pixels, NCHW
//   y     i64  [N]              digit labels
//   mean  f32  [1]              normalisation constants used
//   std   f32  [1]
//
// Reading validates every dtype and shape before handing the
// data to the evaluator.

use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result};
use safetensors::{tensor::TensorView, Dtype, SafeTensors};

use crate::data::{
    error::DataError,
    mnist::{MnistSample, IMAGE_PIXELS, IMAGE_SIDE},
};
use crate::domain::normalization::Normalization;

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTestSet {
    /// Flat NCHW pixels, `len() * 784` values
    pub images: Vec<f32>,
    pub labels: Vec<i64>,
    pub norm:   Normalization,
}

impl NormalizedTestSet {
    pub fn from_samples(samples: &[MnistSample], norm: Normalization) -> Self {
        Self {
            images: samples.iter().flat_map(|s| s.pixels.iter().copied()).collect(),
            labels: samples.iter().map(|s| s.label as i64).collect(),
            norm,
        }
    }

    pub fn len(&self) -> usize { self.labels.len() }

    pub fn is_empty(&self) -> bool { self.labels.is_empty() }

    pub fn image(&self, index: usize) -> &[f32] {
        &self.images[index * IMAGE_PIXELS..(index + 1) * IMAGE_PIXELS]
    }

    pub fn x_shape(&self) -> [usize; 4] { [self.len(), 1, IMAGE_SIDE, IMAGE_SIDE] }

    pub fn write(&self, path: &Path) -> Result<()> {
        if self.is_empty() {
            return Err(DataError::Empty.into());
        }
        let x_bytes:    Vec<u8> = self.images.iter().flat_map(|v| v.to_le_bytes()).collect();
        let y_bytes:    Vec<u8> = self.labels.iter().flat_map(|v| v.to_le_bytes()).collect();
        let mean_bytes: Vec<u8> = self.norm.mean.to_le_bytes().to_vec();
        let std_bytes:  Vec<u8> = self.norm.std.to_le_bytes().to_vec();

        let tensors = vec![
            ("x",    TensorView::new(Dtype::F32, self.x_shape().to_vec(), &x_bytes)?),
            ("y",    TensorView::new(Dtype::I64, vec![self.len()], &y_bytes)?),
            ("mean", TensorView::new(Dtype::F32, vec![1], &mean_bytes)?),
            ("std",  TensorView::new(Dtype::F32, vec![1], &std_bytes)?),
        ];
        let metadata: HashMap<String, String> = HashMap::from([
            ("layout".to_string(), "NCHW".to_string()),
            ("dataset".to_string(), "mnist-test".to_string()),
        ]);
        let bytes = safetensors::serialize(tensors, &Some(metadata))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create directory '{}'", parent.display()))?;
        }
        std::fs::write(path, bytes)
            .with_context(|| format!("Cannot write archive '{}'", path.display()))?;
        tracing::info!("Saved {} normalised test samples to '{}'", self.len(), path.display());
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Cannot read archive '{}'. Run 'mnist train' first.", path.display()))?;
        let archive = SafeTensors::deserialize(&bytes)
            .with_context(|| format!("'{}' is not a safetensors archive", path.display()))?;

        let x    = tensor(&archive, "x", Dtype::F32)?;
        let y    = tensor(&archive, "y", Dtype::I64)?;
        let mean = tensor(&archive, "mean", Dtype::F32)?;
        let std  = tensor(&archive, "std", Dtype::F32)?;

        let labels: Vec<i64> = y.data().chunks_exact(8)
            .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect();
        let n = labels.len();
        if n == 0 {
            return Err(DataError::Empty.into());
        }

        let expected_x = vec![n, 1, IMAGE_SIDE, IMAGE_SIDE];
        if x.shape() != expected_x.as_slice() {
            return Err(DataError::WrongLayout {
                name:     "x".into(),
                expected: format!("shape {expected_x:?}"),
                found:    format!("shape {:?}", x.shape()),
            }.into());
        }

        let images = f32s(x.data());
        if images.len() != n * IMAGE_PIXELS {
            return Err(DataError::Truncated { expected: n * IMAGE_PIXELS, found: images.len() }.into());
        }
        let norm = Normalization::new(scalar(&mean, "mean")?, scalar(&std, "std")?);
        if !norm.is_valid() {
            return Err(DataError::WrongLayout {
                name:     "std".into(),
                expected: "finite mean and std > 0".into(),
                found:    format!("mean {} and std {}", norm.mean, norm.std),
            }.into());
        }

        Ok(Self { images, labels, norm })
    }
}

fn tensor<'a>(archive: &'a SafeTensors<'a>, name: &str, dtype: Dtype) -> Result<TensorView<'a>, DataError> {
    let view = archive.tensor(name).map_err(|_| DataError::MissingTensor(name.to_string()))?;
    if view.dtype() != dtype {
        return Err(DataError::WrongLayout {
            name:     name.to_string(),
            expected: format!("dtype {dtype:?}"),
            found:    format!("dtype {:?}", view.dtype()),
        });
    }
    Ok(view)
}

fn f32s(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4).map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])).collect()
}

/// A normalisation constant: exactly one f32 with shape `[1]`.
fn scalar(view: &TensorView<'_>, name: &str) -> Result<f32, DataError> {
    let values = f32s(view.data());
    match (view.shape(), values.as_slice()) {
        ([1], [v]) => Ok(*v),
        _ => Err(DataError::WrongLayout {
            name:     name.to_string(),
            expected: "shape [1]".into(),
            found:    format!("shape {:?}", view.shape()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_samples() -> Vec<MnistSample> {
        vec![
            MnistSample { pixels: (0..IMAGE_PIXELS).map(|i| i as f32 / 784.0).collect(), label: 5 },
            MnistSample { pixels: vec![-0.42; IMAGE_PIXELS], label: 0 },
        ]
    }

    #[test]
    fn archive_preserves_pixels_labels_and_constants() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.safetensors");
        let set  = NormalizedTestSet::from_samples(&two_samples(), Normalization::MNIST);
        set.write(&path).unwrap();

        let back = NormalizedTestSet::read(&path).unwrap();
        assert_eq!(back.x_shape(), [2, 1, 28, 28]);
        assert_eq!(back.labels, vec![5, 0]);
        assert_eq!(back.norm, Normalization::MNIST);
        assert_eq!(back.image(1)[100], -0.42);
        assert_eq!(back, set);
    }

    #[test]
    fn empty_set_is_rejected_on_write() {
        let dir  = tempfile::tempdir().unwrap();
        let set  = NormalizedTestSet::from_samples(&[], Normalization::MNIST);
        assert!(set.write(&dir.path().join("empty.safetensors")).is_err());
    }

    /// One-image archive with hand-picked label dtype and constants.
    fn write_raw(path: &Path, y_dtype: Dtype, mean: &[f32], std: &[f32]) {
        let x: Vec<u8> = vec![0u8; IMAGE_PIXELS * 4];
        let y: Vec<u8> = match y_dtype {
            Dtype::F32 => 3f32.to_le_bytes().to_vec(),
            _          => 3i64.to_le_bytes().to_vec(),
        };
        let mean_bytes: Vec<u8> = mean.iter().flat_map(|v| v.to_le_bytes()).collect();
        let std_bytes:  Vec<u8> = std.iter().flat_map(|v| v.to_le_bytes()).collect();
        let tensors = vec![
            ("x",    TensorView::new(Dtype::F32, vec![1, 1, 28, 28], &x).unwrap()),
            ("y",    TensorView::new(y_dtype, vec![1], &y).unwrap()),
            ("mean", TensorView::new(Dtype::F32, vec![mean.len()], &mean_bytes).unwrap()),
            ("std",  TensorView::new(Dtype::F32, vec![std.len()], &std_bytes).unwrap()),
        ];
        std::fs::write(path, safetensors::serialize(tensors, &None).unwrap()).unwrap();
    }

    #[test]
    fn wrong_label_dtype_is_reported() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.safetensors");
        write_raw(&path, Dtype::F32, &[1.0], &[1.0]);

        let err = NormalizedTestSet::read(&path).unwrap_err();
        assert!(err.to_string().contains("'y'"), "{err}");
    }

    #[test]
    fn zero_std_is_rejected() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("zero_std.safetensors");
        write_raw(&path, Dtype::I64, &[0.1307], &[0.0]);

        let err = NormalizedTestSet::read(&path).unwrap_err();
        assert!(err.to_string().contains("'std'"), "{err}");
    }

    #[test]
    fn non_scalar_mean_is_rejected() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide_mean.safetensors");
        write_raw(&path, Dtype::I64, &[0.1307, 0.5], &[0.3081]);

        let err = NormalizedTestSet::read(&path).unwrap_err();
        assert!(err.to_string().contains("'mean'"), "{err}");
        assert!(err.to_string().contains("[2]"), "{err}");
    }

    #[test]
    fn unwritable_parent_is_an_error() {
        let dir     = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let set = NormalizedTestSet::from_samples(&two_samples(), Normalization::MNIST);
        let err = set.write(&blocker.join("sub").join("test.safetensors")).unwrap_err();
        assert!(err.to_string().contains("Cannot create directory"), "{err}");
    }

    #[test]
    fn missing_file_mentions_training_step() {
        let err = NormalizedTestSet::read(Path::new("/nonexistent/archive.safetensors")).unwrap_err();
        assert!(err.to_string().contains("mnist train"));
    }
}
