// ============================================================
// Layer 4 — SST-2 Loader
// ============================================================
// Reads the GLUE SST-2 tab-separated files:
//
//   sentence<TAB>label
//   hide new secretions from the parental units <TAB>0
//   ...
//
// The first line is a header. Labels must be 0 (negative) or
// 1 (positive). The GLUE test split has no labels and is not
// supported.

use std::path::Path;

use anyhow::{Context, Result};

use crate::data::error::DataError;
use crate::domain::label::SentimentLabel;

#[derive(Debug, Clone, PartialEq)]
pub struct LabelledSentence {
    pub sentence: String,
    pub label:    SentimentLabel,
}

/// Parse TSV text. `limit` keeps only the first n rows, like
/// selecting `range(n)` on the dataset.
pub fn parse_tsv(text: &str, limit: Option<usize>) -> Result<Vec<LabelledSentence>, DataError> {
    let mut lines = text.lines().enumerate();

    let (_, header) = lines.next().ok_or(DataError::Empty)?;
    let columns: Vec<&str> = header.split('\t').map(str::trim).collect();
    let sentence_col = columns.iter().position(|c| *c == "sentence")
        .ok_or_else(|| DataError::BadRow { line: 1, reason: "header has no 'sentence' column".into() })?;
    let label_col = columns.iter().position(|c| *c == "label")
        .ok_or_else(|| DataError::BadRow { line: 1, reason: "header has no 'label' column".into() })?;

    let mut rows = Vec::new();
    for (i, line) in lines {
        if limit.is_some_and(|n| rows.len() >= n) {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let bad = |reason: String| DataError::BadRow { line: i + 1, reason };

        let sentence = fields.get(sentence_col)
            .ok_or_else(|| bad("missing sentence field".into()))?
            .trim()
            .to_string();
        let raw_label = fields.get(label_col)
            .ok_or_else(|| bad("missing label field".into()))?
            .trim();
        let label = raw_label.parse::<usize>().ok()
            .and_then(SentimentLabel::from_index)
            .ok_or_else(|| bad(format!("label '{raw_label}' is not 0 or 1")))?;

        rows.push(LabelledSentence { sentence, label });
    }
    Ok(rows)
}

pub fn load_tsv(path: &Path, limit: Option<usize>) -> Result<Vec<LabelledSentence>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read SST-2 file '{}'", path.display()))?;
    let rows = parse_tsv(&text, limit)
        .with_context(|| format!("Malformed SST-2 file '{}'", path.display()))?;
    tracing::info!("Loaded {} sentences from '{}'", rows.len(), path.display());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "sentence\tlabel\n\
        hide new secretions from the parental units \t0\n\
        contains no wit , only labored gags \t0\n\
        that loves its characters \t1\n";

    #[test]
    fn parses_rows_and_trims_sentences() {
        let rows = parse_tsv(SAMPLE, None).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].sentence, "hide new secretions from the parental units");
        assert_eq!(rows[2].label, SentimentLabel::Positive);
    }

    #[test]
    fn limit_keeps_leading_rows() {
        let rows = parse_tsv(SAMPLE, Some(2)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].label, SentimentLabel::Negative);
    }

    #[test]
    fn column_order_follows_header() {
        let rows = parse_tsv("label\tsentence\n1\tgreat fun\n", None).unwrap();
        assert_eq!(rows[0].sentence, "great fun");
        assert_eq!(rows[0].label, SentimentLabel::Positive);
    }

    #[test]
    fn rejects_unknown_label() {
        let err = parse_tsv("sentence\tlabel\nmeh\t2\n", None).unwrap_err();
        assert!(matches!(err, DataError::BadRow { line: 2, .. }));
    }

    #[test]
    fn rejects_unlabelled_test_split() {
        assert!(parse_tsv("index\tsentence\n0\tuh\n", None).is_err());
    }
}
