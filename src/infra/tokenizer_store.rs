// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// The sentence classifier is only meaningful with the exact
// vocabulary it was trained with. The pretrained directory's
// tokenizer.json is loaded for training and copied next to the
// fine-tuned checkpoint, so later steps only need that one
// directory.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use tokenizers::Tokenizer;

pub const TOKENIZER_FILE: &str = "tokenizer.json";

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.path();
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
    }

    pub fn save(&self, tokenizer: &Tokenizer) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create directory '{}'", self.dir.display()))?;
        let path = self.path();
        tokenizer
            .save(&path, true)
            .map_err(|e| anyhow!("Cannot write tokenizer to '{}': {}", path.display(), e))?;
        tracing::info!("Tokenizer saved to '{}'", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::encoding::tests::bert_like_tokenizer;

    #[test]
    fn saved_tokenizer_keeps_vocabulary() {
        let dir   = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        assert!(!store.exists());

        store.save(&bert_like_tokenizer()).unwrap();
        let back = store.load().unwrap();
        assert_eq!(back.token_to_id("movie"), Some(3185));
        assert_eq!(back.token_to_id("[CLS]"), Some(101));
    }

    #[test]
    fn missing_tokenizer_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = TokenizerStore::new(dir.path()).load().unwrap_err();
        assert!(err.to_string().contains(TOKENIZER_FILE));
    }
}
