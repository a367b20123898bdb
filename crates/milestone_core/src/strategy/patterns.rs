//! Direct enumerators for numeric patterns.
//!
//! Every enumerator takes an inclusive `limit` and returns the matching
//! values in ascending order without duplicates. Cost is proportional to
//! the number of values produced, never to the magnitude of `limit`.

use std::collections::BTreeSet;

/// Largest digit count whose repunit still fits in `u64`.
pub const MAX_DIGITS: u32 = 18;

/// Repdigits (`d` repeated `len` times) for `len` in `min_len..=max_len`.
pub fn repdigits(min_len: u32, max_len: u32, limit: u64) -> Vec<u64> {
    let mut values = Vec::new();
    for len in min_len.max(1)..=max_len.min(MAX_DIGITS) {
        let repunit = (10u64.pow(len) - 1) / 9;
        if repunit > limit {
            break;
        }
        for digit in 1..=9u64 {
            let value = repunit * digit;
            if value > limit {
                break;
            }
            values.push(value);
        }
    }
    values
}

/// Palindromes with `min_len..=max_len` digits, built by mirroring the
/// first half.
pub fn palindromes(min_len: u32, max_len: u32, limit: u64) -> Vec<u64> {
    let mut values = Vec::new();
    for len in min_len.max(1)..=max_len.min(MAX_DIGITS) {
        let half = (len + 1) / 2;
        let start = 10u64.pow(half - 1);
        let end = 10u64.pow(half);
        let mut produced = false;
        for head in start..end {
            let Some(value) = mirror(head, len) else {
                break;
            };
            if value > limit {
                break;
            }
            values.push(value);
            produced = true;
        }
        if !produced {
            break;
        }
    }
    values
}

/// `2^k` for `k >= min_exponent` up to `limit`.
pub fn powers_of_two(min_exponent: u32, limit: u64) -> Vec<u64> {
    (min_exponent..u64::BITS)
        .map(|exponent| 1u64 << exponent)
        .take_while(|value| *value <= limit)
        .collect()
}

/// Strictly ascending consecutive digit runs (123, 2345, ...) with
/// `min_len..=max_len` digits.
pub fn ascending_runs(min_len: u32, max_len: u32, limit: u64) -> Vec<u64> {
    let mut values = Vec::new();
    for len in min_len.max(1)..=max_len.min(9) {
        for first in 1..=(10 - len) {
            let value = (first..first + len).fold(0u64, |acc, digit| acc * 10 + u64::from(digit));
            if value > limit {
                break;
            }
            values.push(value);
        }
    }
    values
}

/// Multiples `base * k` (`k >= 1`) of every base, merged.
pub fn round_multiples(bases: &[u64], limit: u64) -> Vec<u64> {
    let mut values = BTreeSet::new();
    for &base in bases.iter().filter(|base| **base > 0) {
        let mut value = base;
        while value <= limit {
            values.insert(value);
            match value.checked_add(base) {
                Some(next) => value = next,
                None => break,
            }
        }
    }
    values.into_iter().collect()
}

fn mirror(head: u64, len: u32) -> Option<u64> {
    let mut value = head;
    let mut rest = if len % 2 == 1 { head / 10 } else { head };
    while rest > 0 {
        value = value.checked_mul(10)?.checked_add(rest % 10)?;
        rest /= 10;
    }
    Some(value)
}
