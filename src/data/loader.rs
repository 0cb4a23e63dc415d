// ============================================================
// Layer 4 — Corpus File Loader
// ============================================================
// Reads tab-separated corpus files. The first line is always a
// header and is skipped; blank lines are ignored.
//
// Pair / NLI corpus:
//   question1 \t question2 \t is_duplicate
//   날씨 어때 \t 오늘 날씨는 \t 1
//
// Tagging corpus (tokens and tags are space separated):
//   sentence \t tags
//   김 씨 는 서울 에 \t B-PER I-PER O B-LOC O
//
// Every error carries "path:line" so a broken row is easy to find.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};

use crate::domain::example::{TaggedSentence, TextPair};

/// The rows of a TSV file with at least `min_fields` columns each.
/// Returns (1-based line number, fields).
pub fn read_rows(path: impl AsRef<Path>, min_fields: usize) -> Result<Vec<(usize, Vec<String>)>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read corpus '{}'", path.display()))?;

    let mut rows = Vec::new();
    for (i, line) in text.lines().enumerate().skip(1) {
        let lineno = i + 1;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<String> = line.split('\t').map(str::to_string).collect();
        if fields.len() < min_fields {
            bail!(
                "{}:{}: expected {} tab-separated fields, found {}",
                path.display(), lineno, min_fields, fields.len()
            );
        }
        rows.push((lineno, fields));
    }

    tracing::debug!("Read {} rows from '{}'", rows.len(), path.display());
    Ok(rows)
}

/// Header line of a TSV file (kept when re-writing splits).
pub fn read_header(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read corpus '{}'", path.display()))?;
    Ok(text.lines().next().unwrap_or_default().to_string())
}

/// `left \t right \t label` rows.
pub fn load_pairs(path: impl AsRef<Path>) -> Result<Vec<TextPair>> {
    parse_pairs(path.as_ref(), None)
}

/// Like `load_pairs`, but a label outside `0..num_classes` is an error.
pub fn load_labelled_pairs(path: impl AsRef<Path>, num_classes: usize) -> Result<Vec<TextPair>> {
    parse_pairs(path.as_ref(), Some(num_classes))
}

fn parse_pairs(path: &Path, num_classes: Option<usize>) -> Result<Vec<TextPair>> {
    read_rows(path, 3)?
        .into_iter()
        .map(|(lineno, mut f)| {
            let label = f[2].trim().parse::<usize>().with_context(|| {
                format!("{}:{}: label '{}' is not a class index", path.display(), lineno, f[2])
            })?;
            if let Some(n) = num_classes.filter(|&n| label >= n) {
                bail!("{}:{}: label {} is outside 0..{}", path.display(), lineno, label, n);
            }
            let right = std::mem::take(&mut f[1]);
            let left  = std::mem::take(&mut f[0]);
            Ok(TextPair::new(left, right, label))
        })
        .collect()
}

/// `tokens \t tags` rows with matching counts. Empty sentences are skipped.
pub fn load_tagged(path: impl AsRef<Path>) -> Result<Vec<TaggedSentence>> {
    let path = path.as_ref();
    let mut sentences = Vec::new();
    for (lineno, f) in read_rows(path, 2)? {
        let tokens: Vec<String> = f[0].split_whitespace().map(str::to_string).collect();
        let tags:   Vec<String> = f[1].split_whitespace().map(str::to_string).collect();
        if tokens.len() != tags.len() {
            bail!(
                "{}:{}: {} tokens but {} tags",
                path.display(), lineno, tokens.len(), tags.len()
            );
        }
        if tokens.is_empty() {
            tracing::warn!("{}:{}: empty sentence skipped", path.display(), lineno);
            continue;
        }
        sentences.push(TaggedSentence::new(tokens, tags));
    }
    Ok(sentences)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let p = dir.join(name);
        fs::write(&p, body).unwrap();
        p
    }

    #[test]
    fn test_load_pairs_skips_header_and_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let p   = write(dir.path(), "train.tsv", "q1\tq2\tlabel\n날씨 어때\t오늘 날씨\t1\n\nA\tB\t0\r\n");
        let pairs = load_pairs(&p).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0], TextPair::new("날씨 어때", "오늘 날씨", 1));
        assert_eq!(pairs[1].label, 0);
    }

    #[test]
    fn test_bad_label_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let p   = write(dir.path(), "bad.tsv", "q1\tq2\tlabel\na\tb\tyes\n");
        let err = format!("{:#}", load_pairs(&p).unwrap_err());
        assert!(err.contains("bad.tsv:2"));
    }

    #[test]
    fn test_missing_fields_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p   = write(dir.path(), "short.tsv", "h\na\tb\n");
        assert!(load_pairs(&p).is_err());
    }

    #[test]
    fn test_load_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let p   = write(dir.path(), "ner.tsv", "sentence\ttags\n김 씨 는\tB-PER I-PER O\n");
        let s   = load_tagged(&p).unwrap();
        assert_eq!(s[0].tokens, vec!["김", "씨", "는"]);
        assert_eq!(s[0].tags, vec!["B-PER", "I-PER", "O"]);
    }

    #[test]
    fn test_tag_count_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p   = write(dir.path(), "ner.tsv", "sentence\ttags\n김 씨\tB-PER\n");
        assert!(load_tagged(&p).is_err());
    }

    #[test]
    fn test_read_header() {
        let dir = tempfile::tempdir().unwrap();
        let p   = write(dir.path(), "h.tsv", "a\tb\tc\n1\t2\t3\n");
        assert_eq!(read_header(&p).unwrap(), "a\tb\tc");
    }

    #[test]
    fn test_label_outside_class_range_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let p = write(dir.path(), "pairs.tsv", "a\tb\tlabel\nx\ty\t1\nx\ty\t2\n");
        assert_eq!(load_pairs(&p).unwrap().len(), 2);

        let err = load_labelled_pairs(&p, 2).err().unwrap().to_string();
        assert!(err.contains("pairs.tsv:3"), "{err}");
        assert!(err.contains("outside 0..2"), "{err}");
        assert_eq!(load_labelled_pairs(&p, 3).unwrap()[1].label, 2);
    }
}
