// ============================================================
// Layer 6 — Portable Model Bundle
// ============================================================
// The hand-off format between training and evaluation. A
// bundle is two files sharing a stem:
//
//   <stem>.mpk   — named, full-precision MessagePack weights
//                  (Burn NamedMpkFileRecorder). Every tensor is
//                  stored under its module path, so the file is
//                  self-describing.
//   <stem>.json  — manifest: model kind, architecture config,
//                  input/output tensor signatures (with named
//                  dynamic axes), the sequence length text models
//                  were trained with and the SHA-256 of the weights.
//
// `check` validates a bundle without building the model:
// format tag, version, model kind, weights presence and
// checksum. Inferencers run `check` before `load_weights`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const FORMAT: &str = "burn-named-mpk";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unsupported bundle format '{format}' v{version} (expected 'burn-named-mpk' v1)")]
    UnsupportedFormat { format: String, version: u32 },

    #[error("bundle holds a {found:?} model, expected {expected:?}")]
    WrongKind { expected: ModelKind, found: ModelKind },

    #[error("weights checksum mismatch: manifest says {expected}, file hashes to {found}")]
    ChecksumMismatch { expected: String, found: String },

    #[error("output '{tensor}' has shape {found:?}, signature is {expected}")]
    ShapeMismatch { tensor: String, expected: String, found: Vec<usize> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    MnistCnn,
    BertClassifier,
}

/// One axis of a tensor signature: a fixed size or a named dynamic axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dim {
    Fixed(usize),
    Dynamic(String),
}

impl Dim {
    pub fn dynamic(name: &str) -> Self {
        Dim::Dynamic(name.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorSpec {
    pub name:  String,
    pub dtype: String,
    pub shape: Vec<Dim>,
}

impl TensorSpec {
    pub fn new(name: &str, dtype: &str, shape: Vec<Dim>) -> Self {
        Self { name: name.to_string(), dtype: dtype.to_string(), shape }
    }

    /// True when `dims` has the right rank and every fixed axis matches.
    pub fn accepts(&self, dims: &[usize]) -> bool {
        dims.len() == self.shape.len()
            && self.shape.iter().zip(dims).all(|(axis, &d)| match axis {
                Dim::Fixed(n)   => *n == d,
                Dim::Dynamic(_) => true,
            })
    }

    pub fn describe(&self) -> String {
        let axes: Vec<String> = self.shape.iter().map(|d| match d {
            Dim::Fixed(n)      => n.to_string(),
            Dim::Dynamic(name) => name.clone(),
        }).collect();
        format!("{} {} [{}]", self.name, self.dtype, axes.join(", "))
    }

    /// Fail with a typed error unless `dims` fits this signature.
    pub fn verify(&self, dims: &[usize]) -> Result<(), ExportError> {
        if self.accepts(dims) {
            Ok(())
        } else {
            Err(ExportError::ShapeMismatch {
                tensor:   self.name.clone(),
                expected: self.describe(),
                found:    dims.to_vec(),
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format:         String,
    pub format_version: u32,
    pub model_kind:     ModelKind,
    pub architecture:   serde_json::Value,
    pub inputs:         Vec<TensorSpec>,
    pub outputs:        Vec<TensorSpec>,
    pub weights_file:   String,
    pub weights_sha256: String,
    pub weights_bytes:  u64,
    /// Tokens per sequence used in training; absent for image models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_len:        Option<usize>,
}

impl Manifest {
    pub fn architecture<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.architecture.clone())
            .context("Manifest architecture does not match the expected model config")
    }

    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.outputs.iter().map(|s| s.name.as_str()).collect()
    }
}

/// What the exporter needs besides the weights.
pub struct ExportSpec<'a, C: Serialize> {
    pub kind:         ModelKind,
    pub architecture: &'a C,
    pub inputs:       Vec<TensorSpec>,
    pub outputs:      Vec<TensorSpec>,
    pub max_len:      Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ExportBundle {
    stem: PathBuf,
}

impl ExportBundle {
    /// `stem` is the path without extension, e.g. `data/mnist_cnn`.
    pub fn at(stem: impl Into<PathBuf>) -> Self {
        Self { stem: stem.into() }
    }

    pub fn manifest_path(&self) -> PathBuf { self.stem.with_extension("json") }

    pub fn weights_path(&self) -> PathBuf { self.stem.with_extension("mpk") }

    pub fn write<B: Backend, M: Module<B>, C: Serialize>(&self, model: &M, spec: ExportSpec<'_, C>) -> Result<Manifest> {
        if let Some(parent) = self.stem.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create directory '{}'", parent.display()))?;
        }

        NamedMpkFileRecorder::<FullPrecisionSettings>::new()
            .record(model.clone().into_record(), self.stem.clone())
            .with_context(|| format!("Failed to write weights to '{}'", self.weights_path().display()))?;

        let weights = self.weights_path();
        let (sha, bytes) = file_digest(&weights)?;

        let manifest = Manifest {
            format:         FORMAT.to_string(),
            format_version: FORMAT_VERSION,
            model_kind:     spec.kind,
            architecture:   serde_json::to_value(spec.architecture)?,
            inputs:         spec.inputs,
            outputs:        spec.outputs,
            weights_file:   file_name(&weights),
            weights_sha256: sha,
            weights_bytes:  bytes,
            max_len:        spec.max_len,
        };

        let path = self.manifest_path();
        std::fs::write(&path, serde_json::to_string_pretty(&manifest)?)
            .with_context(|| format!("Cannot write manifest '{}'", path.display()))?;

        tracing::info!(
            "Exported {:?} to '{}' ({} bytes of weights)",
            manifest.model_kind, path.display(), manifest.weights_bytes,
        );
        Ok(manifest)
    }

    pub fn read_manifest(&self) -> Result<Manifest> {
        let path = self.manifest_path();
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot read manifest '{}'. Has the model been exported?", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed manifest '{}'", path.display()))
    }

    /// Structural validation of the bundle on disk.
    pub fn check(&self, expected: ModelKind) -> Result<Manifest> {
        let manifest = self.read_manifest()?;

        if manifest.format != FORMAT || manifest.format_version != FORMAT_VERSION {
            return Err(ExportError::UnsupportedFormat {
                format:  manifest.format.clone(),
                version: manifest.format_version,
            }.into());
        }
        if manifest.model_kind != expected {
            return Err(ExportError::WrongKind { expected, found: manifest.model_kind }.into());
        }

        let weights = self.weights_path();
        let (sha, _) = file_digest(&weights)?;
        if sha != manifest.weights_sha256 {
            return Err(ExportError::ChecksumMismatch { expected: manifest.weights_sha256.clone(), found: sha }.into());
        }

        tracing::debug!("Bundle '{}' passed structural checks", self.manifest_path().display());
        Ok(manifest)
    }

    /// Load the bundle's weights into `model` (built from the manifest architecture).
    pub fn load_weights<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> Result<M> {
        let record = NamedMpkFileRecorder::<FullPrecisionSettings>::new()
            .load(self.stem.clone(), device)
            .with_context(|| format!("Cannot load weights '{}'", self.weights_path().display()))?;
        Ok(model.load_record(record))
    }
}

fn file_digest(path: &Path) -> Result<(String, u64)> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Cannot read weights '{}'", path.display()))?;
    Ok((hex::encode(Sha256::digest(&bytes)), bytes.len() as u64))
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use crate::ml::cnn::{SimpleCnn, SimpleCnnConfig};

    type B = NdArray;

    fn export_cnn(dir: &Path) -> (ExportBundle, SimpleCnn<B>) {
        let cfg = SimpleCnnConfig::new();
        let model: SimpleCnn<B> = cfg.init(&Default::default());
        let bundle = ExportBundle::at(dir.join("digits"));
        bundle.write::<B, _, _>(&model, ExportSpec {
            kind:         ModelKind::MnistCnn,
            architecture: &cfg,
            inputs:  vec![TensorSpec::new("input", "f32", vec![Dim::dynamic("batch"), Dim::Fixed(1), Dim::Fixed(28), Dim::Fixed(28)])],
            outputs: vec![TensorSpec::new("logits", "f32", vec![Dim::dynamic("batch"), Dim::Fixed(10)])],
            max_len: None,
        }).unwrap();
        (bundle, model)
    }

    #[test]
    fn exported_weights_reload_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let (bundle, model) = export_cnn(dir.path());

        let manifest = bundle.check(ModelKind::MnistCnn).unwrap();
        assert_eq!(manifest.weights_file, "digits.mpk");
        assert_eq!(manifest.input_names(), vec!["input"]);
        assert_eq!(manifest.max_len, None);

        let cfg: SimpleCnnConfig = manifest.architecture().unwrap();
        let device = Default::default();
        let loaded = bundle.load_weights::<B, _>(cfg.init::<B>(&device), &device).unwrap();

        let x = Tensor::<B, 4>::ones([2, 1, 28, 28], &device);
        let a: Vec<f32> = model.forward(x.clone()).into_data().iter::<f32>().collect();
        let b: Vec<f32> = loaded.forward(x).into_data().iter::<f32>().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn tampered_weights_fail_the_check() {
        let dir = tempfile::tempdir().unwrap();
        let (bundle, _) = export_cnn(dir.path());

        let mut bytes = std::fs::read(bundle.weights_path()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        std::fs::write(bundle.weights_path(), bytes).unwrap();

        let err = bundle.check(ModelKind::MnistCnn).unwrap_err();
        assert!(matches!(err.downcast_ref::<ExportError>(), Some(ExportError::ChecksumMismatch { .. })));
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (bundle, _) = export_cnn(dir.path());
        let err = bundle.check(ModelKind::BertClassifier).unwrap_err();
        assert!(matches!(err.downcast_ref::<ExportError>(), Some(ExportError::WrongKind { .. })));
    }

    #[test]
    fn dynamic_axes_accept_any_size() {
        let spec = TensorSpec::new("logits", "f32", vec![Dim::dynamic("batch"), Dim::Fixed(10)]);
        assert!(spec.accepts(&[1, 10]));
        assert!(spec.accepts(&[256, 10]));
        assert!(!spec.accepts(&[1, 9]));
        assert!(!spec.accepts(&[10]));
        assert_eq!(spec.describe(), "logits f32 [batch, 10]");
        assert!(spec.verify(&[4, 2]).is_err());
    }

    #[test]
    fn dims_serialise_as_numbers_or_names() {
        let json = serde_json::to_string(&vec![Dim::dynamic("batch"), Dim::Fixed(28)]).unwrap();
        assert_eq!(json, r#"["batch",28]"#);
    }

    #[test]
    fn unwritable_parent_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let cfg = SimpleCnnConfig::new();
        let model: SimpleCnn<B> = cfg.init(&Default::default());
        let err = ExportBundle::at(blocker.join("sub").join("digits"))
            .write::<B, _, _>(&model, ExportSpec {
                kind:         ModelKind::MnistCnn,
                architecture: &cfg,
                inputs:       vec![],
                outputs:      vec![],
                max_len:      None,
            })
            .unwrap_err();
        assert!(err.to_string().contains("Cannot create directory"), "{err}");
    }

    #[test]
    fn manifest_without_max_len_still_parses() {
        let dir = tempfile::tempdir().unwrap();
        let (bundle, _) = export_cnn(dir.path());
        let json = std::fs::read_to_string(bundle.manifest_path()).unwrap();
        assert!(!json.contains("max_len"));

        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["max_len"] = serde_json::json!(64);
        let manifest: Manifest = serde_json::from_value(value).unwrap();
        assert_eq!(manifest.max_len, Some(64));
    }
}
