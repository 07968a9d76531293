//! Seed phrase encoding and decoding.
//!
//! A seed is 32 bytes of entropy. Its phrase form is the 38-byte value
//! `seed || blake2b256(seed)[..6]` converted to 28 or 29 dictionary words
//! through the shifted positional codec in [`crate::baseconv`]. The 6-byte
//! checksum is the primary defense against a mistyped or reordered word.

use blake2::{digest::Digest, Blake2b};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::baseconv;
use crate::dictionary::Dictionary;
use crate::error::WalletError;

/// Bytes of entropy in a seed.
pub const SEED_BYTES: usize = 32;

/// Bytes of hash appended to the entropy before encoding.
pub const CHECKSUM_BYTES: usize = 6;

const MIN_WORD_LEN: usize = 4;
const MAX_WORD_LEN: usize = 12;

/// Blake2b with 256-bit output.
pub(crate) type Blake2b256 = Blake2b<blake2::digest::consts::U32>;

/// 32 bytes of wallet entropy. Zeroed on drop, never logged.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; SEED_BYTES]);

impl Seed {
    /// Draws a fresh seed from the OS entropy source.
    pub fn generate() -> Self {
        let mut buf = [0u8; SEED_BYTES];
        OsRng.fill_bytes(&mut buf);
        let seed = Seed(buf);
        buf.zeroize();
        seed
    }

    pub fn from_bytes(bytes: [u8; SEED_BYTES]) -> Self {
        Seed(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SEED_BYTES] {
        &self.0
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // entropy stays out of logs and panics
        f.write_str("Seed(..)")
    }
}

fn checksum(entropy: &[u8]) -> [u8; CHECKSUM_BYTES] {
    let digest = Blake2b256::digest(entropy);
    let mut out = [0u8; CHECKSUM_BYTES];
    out.copy_from_slice(&digest[..CHECKSUM_BYTES]);
    out
}

/// Structural phrase checks. These run before any dictionary lookup so the
/// later stages can assume a clean word list.
fn check_phrase_format(phrase: &str) -> Result<(), WalletError> {
    for c in phrase.chars() {
        if c.is_uppercase() {
            return Err(WalletError::MalformedPhrase(
                "all words must be lowercase".to_string(),
            ));
        }
        if !c.is_alphabetic() && !c.is_whitespace() {
            return Err(WalletError::MalformedPhrase(format!(
                "illegal character '{}'",
                c
            )));
        }
    }

    let words: Vec<&str> = phrase.split_whitespace().collect();
    if words.len() != 28 && words.len() != 29 {
        return Err(WalletError::MalformedPhrase(
            "must be 28 or 29 words".to_string(),
        ));
    }

    for word in words {
        let len = word.chars().count();
        if !(MIN_WORD_LEN..=MAX_WORD_LEN).contains(&len) {
            return Err(WalletError::MalformedPhrase(format!(
                "word \"{}\" has invalid length",
                word
            )));
        }
    }

    Ok(())
}

/// Encodes a seed as a recovery phrase.
pub fn seed_to_phrase(seed: &Seed, dict: &Dictionary) -> String {
    let mut checksummed = [0u8; SEED_BYTES + CHECKSUM_BYTES];
    checksummed[..SEED_BYTES].copy_from_slice(seed.as_bytes());
    checksummed[SEED_BYTES..].copy_from_slice(&checksum(seed.as_bytes()));

    let value = baseconv::bytes_to_int(&checksummed);
    checksummed.zeroize();

    let words: Vec<&str> = baseconv::int_to_digits(&value, dict.len() as u32)
        .into_iter()
        .map(|i| dict.word(i).expect("index within dictionary"))
        .collect();
    words.join(" ")
}

/// Decodes a recovery phrase back into a seed, validating format, word
/// membership, decoded length and checksum in that order.
pub fn seed_from_phrase(phrase: &str, dict: &Dictionary) -> Result<Seed, WalletError> {
    check_phrase_format(phrase)?;

    let mut indices = Vec::new();
    for word in phrase.split_whitespace() {
        indices.push(dict.lookup(word)?);
    }

    let value = baseconv::digits_to_int(indices, dict.len() as u32);
    let mut bytes = baseconv::int_to_bytes(&value);
    if bytes.len() != SEED_BYTES + CHECKSUM_BYTES {
        let actual = bytes.len();
        bytes.zeroize();
        return Err(WalletError::InvalidSeedLength {
            expected: SEED_BYTES + CHECKSUM_BYTES,
            actual,
        });
    }

    let expected = checksum(&bytes[..SEED_BYTES]);
    if expected[..] != bytes[SEED_BYTES..] {
        let err = WalletError::ChecksumMismatch {
            expected: hex::encode(expected),
            actual: hex::encode(&bytes[SEED_BYTES..]),
        };
        bytes.zeroize();
        return Err(err);
    }

    let mut entropy = [0u8; SEED_BYTES];
    entropy.copy_from_slice(&bytes[..SEED_BYTES]);
    bytes.zeroize();
    let seed = Seed::from_bytes(entropy);
    entropy.zeroize();
    Ok(seed)
}

/// Generates a new random recovery phrase. The backing entropy is zeroed
/// once the phrase has been produced.
pub fn new_seed_phrase(dict: &Dictionary) -> String {
    let seed = Seed::generate();
    seed_to_phrase(&seed, dict)
}
