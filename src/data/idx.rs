// ============================================================
// Layer 4 — IDX Reader
// ============================================================
// MNIST ships as four IDX files. Both layouts are big-endian:
//
//   images (idx3): magic 0x00000803 | count | rows | cols | bytes...
//   labels (idx1): magic 0x00000801 | count | bytes...
//
// Only the uncompressed files are read here; gunzip them first
// or let the downloading source fetch them.

use std::path::Path;

use anyhow::{Context, Result};

use crate::data::error::DataError;

pub const IMAGES_MAGIC: u32 = 0x0000_0803;
pub const LABELS_MAGIC: u32 = 0x0000_0801;

pub const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
pub const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
pub const TEST_IMAGES:  &str = "t10k-images-idx3-ubyte";
pub const TEST_LABELS:  &str = "t10k-labels-idx1-ubyte";

/// Raw image block: `count` images of `rows * cols` bytes each.
#[derive(Debug, Clone)]
pub struct IdxImages {
    pub rows:   usize,
    pub cols:   usize,
    pub pixels: Vec<u8>,
}

impl IdxImages {
    pub fn count(&self) -> usize {
        if self.rows * self.cols == 0 { 0 } else { self.pixels.len() / (self.rows * self.cols) }
    }

    pub fn image(&self, index: usize) -> &[u8] {
        let size = self.rows * self.cols;
        &self.pixels[index * size..(index + 1) * size]
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, DataError> {
    bytes
        .get(offset..offset + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(DataError::Truncated { expected: offset + 4, found: bytes.len() })
}

fn check_magic(bytes: &[u8], expected: u32) -> Result<(), DataError> {
    let found = read_u32(bytes, 0)?;
    if found != expected {
        return Err(DataError::BadMagic { expected, found });
    }
    Ok(())
}

pub fn parse_images(bytes: &[u8]) -> Result<IdxImages, DataError> {
    check_magic(bytes, IMAGES_MAGIC)?;
    let count = read_u32(bytes, 4)? as usize;
    let rows  = read_u32(bytes, 8)? as usize;
    let cols  = read_u32(bytes, 12)? as usize;

    let expected = count
        .checked_mul(rows)
        .and_then(|n| n.checked_mul(cols))
        .and_then(|n| n.checked_add(16))
        .ok_or(DataError::HeaderOverflow { count, rows, cols })?;
    if bytes.len() < expected {
        return Err(DataError::Truncated { expected, found: bytes.len() });
    }
    Ok(IdxImages { rows, cols, pixels: bytes[16..expected].to_vec() })
}

pub fn parse_labels(bytes: &[u8]) -> Result<Vec<u8>, DataError> {
    check_magic(bytes, LABELS_MAGIC)?;
    let count    = read_u32(bytes, 4)? as usize;
    let expected = 8 + count;
    if bytes.len() < expected {
        return Err(DataError::Truncated { expected, found: bytes.len() });
    }
    Ok(bytes[8..expected].to_vec())
}

/// Read a matching image/label pair from disk.
pub fn read_pair(images_path: &Path, labels_path: &Path) -> Result<(IdxImages, Vec<u8>)> {
    let image_bytes = std::fs::read(images_path)
        .with_context(|| format!("Cannot read '{}'", images_path.display()))?;
    let label_bytes = std::fs::read(labels_path)
        .with_context(|| format!("Cannot read '{}'", labels_path.display()))?;

    let images = parse_images(&image_bytes)
        .with_context(|| format!("Malformed image file '{}'", images_path.display()))?;
    let labels = parse_labels(&label_bytes)
        .with_context(|| format!("Malformed label file '{}'", labels_path.display()))?;

    if images.count() != labels.len() {
        return Err(DataError::CountMismatch { images: images.count(), labels: labels.len() }.into());
    }
    Ok((images, labels))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn images_file(count: u32, rows: u32, cols: u32, fill: impl Fn(usize) -> u8) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&IMAGES_MAGIC.to_be_bytes());
        out.extend_from_slice(&count.to_be_bytes());
        out.extend_from_slice(&rows.to_be_bytes());
        out.extend_from_slice(&cols.to_be_bytes());
        out.extend((0..(count * rows * cols) as usize).map(fill));
        out
    }

    pub(crate) fn labels_file(labels: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&LABELS_MAGIC.to_be_bytes());
        out.extend_from_slice(&(labels.len() as u32).to_be_bytes());
        out.extend_from_slice(labels);
        out
    }

    #[test]
    fn parses_image_header_and_pixels() {
        let bytes  = images_file(2, 3, 3, |i| i as u8);
        let images = parse_images(&bytes).unwrap();
        assert_eq!(images.count(), 2);
        assert_eq!(images.rows, 3);
        assert_eq!(images.image(1), &[9, 10, 11, 12, 13, 14, 15, 16, 17]);
    }

    #[test]
    fn rejects_label_magic_in_image_file() {
        let bytes = labels_file(&[1, 2, 3]);
        match parse_images(&bytes) {
            Err(DataError::BadMagic { expected, found }) => {
                assert_eq!(expected, IMAGES_MAGIC);
                assert_eq!(found, LABELS_MAGIC);
            }
            other => panic!("expected BadMagic, got {other:?}"),
        }
    }

    #[test]
    fn rejects_truncated_payload() {
        let mut bytes = images_file(2, 28, 28, |_| 0);
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(parse_images(&bytes), Err(DataError::Truncated { .. })));
    }

    #[test]
    fn rejects_short_header() {
        assert!(matches!(parse_labels(&[0, 0, 8]), Err(DataError::Truncated { .. })));
    }

    #[test]
    fn parses_labels() {
        let labels = parse_labels(&labels_file(&[7, 2, 1, 0])).unwrap();
        assert_eq!(labels, vec![7, 2, 1, 0]);
    }

    #[test]
    fn read_pair_detects_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join(TEST_IMAGES);
        let lbl = dir.path().join(TEST_LABELS);
        std::fs::write(&img, images_file(3, 28, 28, |_| 0)).unwrap();
        std::fs::write(&lbl, labels_file(&[1, 2])).unwrap();

        let err = read_pair(&img, &lbl).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn oversized_header_is_an_error_not_a_panic() {
        let mut bytes = IMAGES_MAGIC.to_be_bytes().to_vec();
        for dim in [1u32 << 22, 1 << 22, 1 << 22] {
            bytes.extend_from_slice(&dim.to_be_bytes());
        }
        match parse_images(&bytes) {
            Err(DataError::HeaderOverflow { count, rows, cols }) => {
                assert_eq!((count, rows, cols), (1 << 22, 1 << 22, 1 << 22));
            }
            other => panic!("expected HeaderOverflow, got {other:?}"),
        }
    }
}
