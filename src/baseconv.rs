//! Bijective conversion between digit sequences and big integers.
//!
//! A byte slice can be viewed as a sequence of base-256 digits and a word
//! sequence as base-1626 digits. A plain positional encoding collapses
//! leading zeros ({0} and {0, 0} both become 0), so each digit is shifted
//! up by one before being weighted: digit d at position i contributes
//! (d + 1) * base^i and the sum starts from -1. In base 256:
//!
//! ```text
//! {0}    -> 0
//! {255}  -> 255
//! {0, 0} -> 256
//! {1, 0} -> 257
//! {0, 1} -> 512
//! ```
//!
//! Every finite sequence maps to a unique integer and back. The empty
//! sequence maps to the sentinel -1.

use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive};

/// Radix of the byte domain.
pub const BYTE_BASE: u32 = 256;

/// Folds a digit sequence into a single integer, least significant digit
/// first. Digits must be smaller than `base`.
pub fn digits_to_int<I>(digits: I, base: u32) -> BigInt
where
    I: IntoIterator<Item = usize>,
{
    let base = BigInt::from(base);
    let mut exp = BigInt::one();
    let mut result = BigInt::from(-1);
    for digit in digits {
        result += (BigInt::from(digit) + 1) * &exp;
        exp *= &base;
    }
    result
}

/// The exact inverse of [`digits_to_int`]. Negative input (the empty-sequence
/// sentinel) yields an empty sequence.
pub fn int_to_digits(value: &BigInt, base: u32) -> Vec<usize> {
    if value.is_negative() {
        return Vec::new();
    }

    let base_int = BigInt::from(base);
    let mut remaining = value.clone();
    let mut digits = Vec::new();
    while remaining >= base_int {
        let digit = (&remaining % &base_int)
            .to_usize()
            .expect("digit below base");
        digits.push(digit);
        // undo the +1 shift before dropping to the next position
        remaining -= &base_int;
        remaining /= &base_int;
    }
    digits.push(remaining.to_usize().expect("digit below base"));
    digits
}

/// Converts a byte slice to an integer, preserving leading zeros.
pub fn bytes_to_int(bytes: &[u8]) -> BigInt {
    digits_to_int(bytes.iter().map(|b| *b as usize), BYTE_BASE)
}

/// Converts an integer back to the unique byte slice that produced it.
pub fn int_to_bytes(value: &BigInt) -> Vec<u8> {
    int_to_digits(value, BYTE_BASE)
        .into_iter()
        .map(|d| d as u8)
        .collect()
}
