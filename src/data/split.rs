// ============================================================
// Layer 4 — Splitters
// ============================================================
// Tokenisation strategies implementing domain::traits::Splitter.
//
//   WordSplitter       — coarse tokens: whitespace-separated words
//                        with punctuation split off
//   JamoSplitter       — fine tokens: Hangul syllables decomposed
//                        into initial / medial / final jamo
//   PretrainedSplitter — word pieces from a tokenizer.json
//
// Hangul syllable arithmetic (U+AC00 ..= U+D7A3):
//   index   = code - 0xAC00
//   initial = index / 588
//   medial  = (index % 588) / 28
//   final   = index % 28        (0 = no final consonant)

use anyhow::{anyhow, Result};
use tokenizers::Tokenizer;

use crate::domain::traits::Splitter;

const SYLLABLE_BASE:  u32 = 0xAC00;
const SYLLABLE_LAST:  u32 = 0xD7A3;
const MEDIAL_X_FINAL: u32 = 21 * 28;

const INITIALS: [char; 19] = [
    'ㄱ', 'ㄲ', 'ㄴ', 'ㄷ', 'ㄸ', 'ㄹ', 'ㅁ', 'ㅂ', 'ㅃ', 'ㅅ',
    'ㅆ', 'ㅇ', 'ㅈ', 'ㅉ', 'ㅊ', 'ㅋ', 'ㅌ', 'ㅍ', 'ㅎ',
];

const MEDIALS: [char; 21] = [
    'ㅏ', 'ㅐ', 'ㅑ', 'ㅒ', 'ㅓ', 'ㅔ', 'ㅕ', 'ㅖ', 'ㅗ', 'ㅘ',
    'ㅙ', 'ㅚ', 'ㅛ', 'ㅜ', 'ㅝ', 'ㅞ', 'ㅟ', 'ㅠ', 'ㅡ', 'ㅢ', 'ㅣ',
];

// Index 0 means "no final consonant"
const FINALS: [Option<char>; 28] = [
    None,      Some('ㄱ'), Some('ㄲ'), Some('ㄳ'), Some('ㄴ'), Some('ㄵ'), Some('ㄶ'),
    Some('ㄷ'), Some('ㄹ'), Some('ㄺ'), Some('ㄻ'), Some('ㄼ'), Some('ㄽ'), Some('ㄾ'),
    Some('ㄿ'), Some('ㅀ'), Some('ㅁ'), Some('ㅂ'), Some('ㅄ'), Some('ㅅ'), Some('ㅆ'),
    Some('ㅇ'), Some('ㅈ'), Some('ㅊ'), Some('ㅋ'), Some('ㅌ'), Some('ㅍ'), Some('ㅎ'),
];

// ─── WordSplitter ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default)]
pub struct WordSplitter;

impl Splitter for WordSplitter {
    fn split(&self, text: &str) -> Result<Vec<String>> {
        let mut tokens = Vec::new();
        for word in text.split_whitespace() {
            let mut current = String::new();
            for c in word.chars() {
                if c.is_ascii_punctuation() {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                    tokens.push(c.to_string());
                } else {
                    current.push(c);
                }
            }
            if !current.is_empty() {
                tokens.push(current);
            }
        }
        Ok(tokens)
    }
}

// ─── JamoSplitter ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default)]
pub struct JamoSplitter;

impl JamoSplitter {
    /// Decompose one character; non-syllables are returned unchanged.
    pub fn decompose(c: char) -> Vec<char> {
        let code = c as u32;
        if !(SYLLABLE_BASE..=SYLLABLE_LAST).contains(&code) {
            return vec![c];
        }
        let index = code - SYLLABLE_BASE;
        let mut out = vec![
            INITIALS[(index / MEDIAL_X_FINAL) as usize],
            MEDIALS[((index % MEDIAL_X_FINAL) / 28) as usize],
        ];
        out.extend(FINALS[(index % 28) as usize]);
        out
    }
}

impl Splitter for JamoSplitter {
    fn split(&self, text: &str) -> Result<Vec<String>> {
        Ok(text
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(Self::decompose)
            .map(String::from)
            .collect())
    }
}

// ─── PretrainedSplitter ───────────────────────────────────────────────────────
pub struct PretrainedSplitter {
    tokenizer: Tokenizer,
}

impl PretrainedSplitter {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self { tokenizer }
    }
}

impl Splitter for PretrainedSplitter {
    fn split(&self, text: &str) -> Result<Vec<String>> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| anyhow!("Tokenisation error: {e}"))?;
        Ok(encoding.get_tokens().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_splitter_separates_punctuation() {
        let tokens = WordSplitter.split("안녕, 세상!  hello").unwrap();
        assert_eq!(tokens, vec!["안녕", ",", "세상", "!", "hello"]);
    }

    #[test]
    fn test_word_splitter_empty() {
        assert!(WordSplitter.split("   ").unwrap().is_empty());
    }

    #[test]
    fn test_decompose_with_final() {
        assert_eq!(JamoSplitter::decompose('한'), vec!['ㅎ', 'ㅏ', 'ㄴ']);
    }

    #[test]
    fn test_decompose_without_final() {
        assert_eq!(JamoSplitter::decompose('가'), vec!['ㄱ', 'ㅏ']);
        assert_eq!(JamoSplitter::decompose('힣'), vec!['ㅎ', 'ㅣ', 'ㅎ']);
    }

    #[test]
    fn test_jamo_passes_other_chars_and_drops_spaces() {
        let tokens = JamoSplitter.split("a 나").unwrap();
        assert_eq!(tokens, vec!["a", "ㄴ", "ㅏ"]);
    }
}
