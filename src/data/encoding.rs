// ============================================================
// Layer 4 — Sentence Encoding
// ============================================================
// Converts a sentence into the fixed-length BERT input:
//
//   [CLS] word-pieces... [SEP] [PAD] [PAD] ... (max_len total)
//   1     1 ...           1     0     0         attention mask
//
// Content is truncated to max_len - 2 so [SEP] always
// survives. Word-pieces come from the tokenizer without its
// own post-processing; framing happens here so the result
// does not depend on the padding/truncation settings stored
// in tokenizer.json.

use anyhow::{anyhow, Result};
use tokenizers::Tokenizer;

pub const DEFAULT_MAX_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedText {
    pub input_ids:      Vec<u32>,
    pub attention_mask: Vec<u32>,
}

impl EncodedText {
    pub fn len(&self) -> usize { self.input_ids.len() }

    pub fn is_empty(&self) -> bool { self.input_ids.is_empty() }

    /// Number of non-padding positions.
    pub fn real_tokens(&self) -> usize {
        self.attention_mask.iter().filter(|&&m| m == 1).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub cls: u32,
    pub sep: u32,
    pub pad: u32,
}

impl SpecialTokens {
    /// bert-base-uncased ids
    pub const BERT: SpecialTokens = SpecialTokens { cls: 101, sep: 102, pad: 0 };
}

pub fn frame(content: &[u32], special: SpecialTokens, max_len: usize) -> EncodedText {
    debug_assert!(max_len >= 2);
    let keep = content.len().min(max_len.saturating_sub(2));

    let mut input_ids = Vec::with_capacity(max_len);
    input_ids.push(special.cls);
    input_ids.extend_from_slice(&content[..keep]);
    input_ids.push(special.sep);

    let mut attention_mask = vec![1u32; input_ids.len()];
    input_ids.resize(max_len, special.pad);
    attention_mask.resize(max_len, 0);

    EncodedText { input_ids, attention_mask }
}

pub struct TextEncoder {
    tokenizer: Tokenizer,
    special:   SpecialTokens,
    max_len:   usize,
}

impl TextEncoder {
    /// Looks up [CLS]/[SEP]/[PAD] in the tokenizer vocabulary.
    pub fn new(tokenizer: Tokenizer, max_len: usize) -> Result<Self> {
        let lookup = |token: &str| {
            tokenizer.token_to_id(token)
                .ok_or_else(|| anyhow!("tokenizer vocabulary has no '{token}' token"))
        };
        let special = SpecialTokens { cls: lookup("[CLS]")?, sep: lookup("[SEP]")?, pad: lookup("[PAD]")? };
        if max_len < 2 {
            return Err(anyhow!("max_len must leave room for [CLS] and [SEP], got {max_len}"));
        }
        Ok(Self { tokenizer, special, max_len })
    }

    pub fn max_len(&self) -> usize { self.max_len }

    pub fn vocab_size(&self) -> usize { self.tokenizer.get_vocab_size(true) }

    pub fn tokenizer(&self) -> &Tokenizer { &self.tokenizer }

    pub fn encode(&self, text: &str) -> Result<EncodedText> {
        let enc = self.tokenizer
            .encode(text, false)
            .map_err(|e| anyhow!("Tokenisation error: {e}"))?;
        Ok(frame(enc.get_ids(), self.special, self.max_len))
    }

    pub fn encode_all<'a>(&self, texts: impl IntoIterator<Item = &'a str>) -> Result<Vec<EncodedText>> {
        texts.into_iter().map(|t| self.encode(t)).collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::str::FromStr;

    /// A tiny uncased WordPiece tokenizer using bert-base-uncased ids
    /// for the words it knows.
    pub(crate) fn bert_like_tokenizer() -> Tokenizer {
        let json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": null,
                "lowercase": true
            },
            "pre_tokenizer": { "type": "BertPreTokenizer" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordPiece",
                "unk_token": "[UNK]",
                "continuing_subword_prefix": "##",
                "max_input_chars_per_word": 100,
                "vocab": {
                    "[PAD]": 0, "[UNK]": 100, "[CLS]": 101, "[SEP]": 102,
                    "!": 999, ".": 1012, "is": 2003, "this": 2023,
                    "great": 2307, "movie": 3185, "terrible": 6659
                }
            }
        });
        Tokenizer::from_str(&json.to_string()).unwrap()
    }

    #[test]
    fn frames_short_content_with_padding() {
        let enc = frame(&[7, 8], SpecialTokens::BERT, 6);
        assert_eq!(enc.input_ids, vec![101, 7, 8, 102, 0, 0]);
        assert_eq!(enc.attention_mask, vec![1, 1, 1, 1, 0, 0]);
    }

    #[test]
    fn truncation_keeps_sep_last() {
        let content: Vec<u32> = (1..=10).collect();
        let enc = frame(&content, SpecialTokens::BERT, 5);
        assert_eq!(enc.input_ids, vec![101, 1, 2, 3, 102]);
        assert_eq!(enc.real_tokens(), 5);
    }

    #[test]
    fn empty_content_is_cls_sep() {
        let enc = frame(&[], SpecialTokens::BERT, 4);
        assert_eq!(enc.input_ids, vec![101, 102, 0, 0]);
    }

    #[test]
    fn matches_reference_ids_for_sample_sentence() {
        let encoder = TextEncoder::new(bert_like_tokenizer(), DEFAULT_MAX_LEN).unwrap();
        let enc = encoder.encode("This movie is great!").unwrap();

        let mut expected = vec![101, 2023, 3185, 2003, 2307, 999, 102];
        expected.resize(DEFAULT_MAX_LEN, 0);
        assert_eq!(enc.input_ids, expected);
        assert_eq!(enc.real_tokens(), 7);
        assert_eq!(enc.len(), DEFAULT_MAX_LEN);
    }

    #[test]
    fn unknown_words_map_to_unk() {
        let encoder = TextEncoder::new(bert_like_tokenizer(), 8).unwrap();
        let enc = encoder.encode("This plot").unwrap();
        assert_eq!(&enc.input_ids[..4], &[101, 2023, 100, 102]);
    }

    #[test]
    fn rejects_degenerate_max_len() {
        assert!(TextEncoder::new(bert_like_tokenizer(), 1).is_err());
    }
}
