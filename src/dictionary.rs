//! Mnemonic word dictionary.
//!
//! A dictionary is a fixed, ordered list of 1626 lowercase words used as a
//! base-1626 alphabet. Words are identified by their first three code
//! points, so prefixes must be unique within a list. The dictionary is an
//! injected object rather than a global so alternate language lists can be
//! swapped in for tests.

use lazy_static::lazy_static;
use unicode_normalization::UnicodeNormalization;

use crate::error::WalletError;

/// Number of words every dictionary must contain.
pub const DICTIONARY_SIZE: usize = 1626;

/// Number of leading code points that identify a word.
pub const PREFIX_LEN: usize = 3;

static ENGLISH_RAW: &str = include_str!("dictionary/english.txt");

lazy_static! {
    static ref ENGLISH: Dictionary = Dictionary::from_words(
        ENGLISH_RAW
            .lines()
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect(),
    );
}

#[derive(Debug, Clone)]
pub struct Dictionary {
    words: Vec<String>,
}

impl Dictionary {
    /// The embedded english word list.
    pub fn english() -> &'static Dictionary {
        &ENGLISH
    }

    pub fn from_words(words: Vec<String>) -> Self {
        Dictionary { words }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn word(&self, index: usize) -> Option<&str> {
        self.words.get(index).map(String::as_str)
    }

    /// Resolves a word to its dictionary index. The word is NFC-normalized
    /// and only its first three code points are compared; the first entry
    /// with a matching prefix wins.
    pub fn lookup(&self, word: &str) -> Result<usize, WalletError> {
        let normalized: String = word.nfc().collect();
        let prefix: String = normalized.chars().take(PREFIX_LEN).collect();
        self.words
            .iter()
            .position(|w| w.starts_with(&prefix))
            .ok_or_else(|| WalletError::UnknownWord(word.to_string()))
    }
}
