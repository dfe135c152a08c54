//! Packed binary vectors and the fixed patterns used to encode them.
//!
//! [`BitVector`] stores bits MSB-first inside bytes. Any padding bits in the
//! final byte are kept at zero, so byte-level comparisons and population
//! counts never see stale data.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bits shown by `Display` before the output is elided.
const DISPLAY_LIMIT: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BitsError {
    #[error("bit pattern must not be empty")]
    EmptyPattern,
    #[error("bit pattern contains invalid digit {0:?} (expected '0' or '1')")]
    InvalidDigit(char),
    #[error("bit index {index} out of range for vector of {len} bits")]
    OutOfRange { index: usize, len: usize },
}

/// A fixed-length, packed sequence of bits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BitVector {
    bytes: Vec<u8>,
    len: usize,
}

impl BitVector {
    /// All-zero vector of `len` bits.
    #[must_use]
    pub fn zeros(len: usize) -> Self {
        Self {
            bytes: vec![0; len.div_ceil(8)],
            len,
        }
    }

    /// Expands every byte into eight bits, most significant bit first.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            len: bytes.len() * 8,
        }
    }

    #[must_use]
    pub fn from_bits(bits: impl IntoIterator<Item = bool>) -> Self {
        let mut bytes = Vec::new();
        let mut len = 0usize;
        for bit in bits {
            if len % 8 == 0 {
                bytes.push(0);
            }
            if bit && let Some(last) = bytes.last_mut() {
                *last |= 0x80 >> (len % 8);
            }
            len += 1;
        }
        Self { bytes, len }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<bool> {
        if index >= self.len {
            return None;
        }
        let byte = self.bytes.get(index / 8)?;
        Some(byte & (0x80 >> (index % 8)) != 0)
    }

    pub fn set(&mut self, index: usize, value: bool) -> Result<(), BitsError> {
        let len = self.len;
        let byte = self
            .bytes
            .get_mut(index / 8)
            .filter(|_| index < len)
            .ok_or(BitsError::OutOfRange { index, len })?;
        let mask = 0x80 >> (index % 8);
        if value {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
        Ok(())
    }

    pub fn flip(&mut self, index: usize) -> Result<(), BitsError> {
        let current = self.get(index).ok_or(BitsError::OutOfRange {
            index,
            len: self.len,
        })?;
        self.set(index, !current)
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(|index| self.get(index).unwrap_or(false))
    }

    /// Packed bytes. When `len` is not a multiple of eight the trailing
    /// padding bits are zero.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    #[must_use]
    pub fn count_ones(&self) -> u64 {
        self.bytes.iter().map(|b| u64::from(b.count_ones())).sum()
    }

    /// Number of differing positions, or `None` when the lengths differ.
    #[must_use]
    pub fn hamming_distance(&self, other: &Self) -> Option<usize> {
        if self.len != other.len {
            return None;
        }
        Some(
            self.bytes
                .iter()
                .zip(&other.bytes)
                .map(|(a, b)| (a ^ b).count_ones() as usize)
                .sum(),
        )
    }

    /// Fraction of aligned positions holding the same bit.
    ///
    /// Two empty vectors agree completely. Vectors of different length have no
    /// aligned positions and return `None`.
    #[must_use]
    pub fn agreement_ratio(&self, other: &Self) -> Option<f64> {
        let distance = self.hamming_distance(other)?;
        if self.len == 0 {
            return Some(1.0);
        }
        Some(1.0 - distance as f64 / self.len as f64)
    }

    /// Jaccard overlap of the set bits: `|a AND b| / |a OR b|`.
    ///
    /// Returns 1.0 when neither vector has a set bit.
    #[must_use]
    pub fn jaccard(&self, other: &Self) -> Option<f64> {
        if self.len != other.len {
            return None;
        }
        let (both, either) = self
            .bytes
            .iter()
            .zip(&other.bytes)
            .fold((0u64, 0u64), |(both, either), (a, b)| {
                (
                    both + u64::from((a & b).count_ones()),
                    either + u64::from((a | b).count_ones()),
                )
            });
        if either == 0 {
            return Some(1.0);
        }
        Some(both as f64 / either as f64)
    }

    /// XOR every bit with the pattern, repeating the pattern as needed.
    ///
    /// Applying the same pattern twice restores the original vector.
    #[must_use]
    pub fn xor_pattern(&self, pattern: &BitPattern) -> Self {
        let mut out = self.clone();
        for index in 0..self.len {
            if pattern.bit_at(index) {
                let byte = &mut out.bytes[index / 8];
                *byte ^= 0x80 >> (index % 8);
            }
        }
        out
    }
}

impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in self.iter().take(DISPLAY_LIMIT) {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        if self.len > DISPLAY_LIMIT {
            write!(f, "... ({} bits)", self.len)?;
        }
        Ok(())
    }
}

/// A non-empty repeating bit pattern such as `0101`.
///
/// # Serde
///
/// Serializes as a string of `0`/`1` digits. Deserialization rejects empty
/// strings and any other character.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BitPattern(Vec<bool>);

impl BitPattern {
    pub fn parse(raw: &str) -> Result<Self, BitsError> {
        let bits = raw
            .trim()
            .chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(BitsError::InvalidDigit(other)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_bits(bits)
    }

    pub fn from_bits(bits: Vec<bool>) -> Result<Self, BitsError> {
        if bits.is_empty() {
            return Err(BitsError::EmptyPattern);
        }
        Ok(Self(bits))
    }

    /// Literal patterns. Emptiness is rejected at compile time.
    #[must_use]
    pub fn from_array<const N: usize>(bits: [bool; N]) -> Self {
        const { assert!(N > 0, "bit pattern must not be empty") };
        Self(bits.to_vec())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bit at `index` of the infinitely repeated pattern.
    #[must_use]
    pub fn bit_at(&self, index: usize) -> bool {
        self.0[index % self.0.len()]
    }
}

impl fmt::Display for BitPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in &self.0 {
            f.write_str(if *bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl TryFrom<String> for BitPattern {
    type Error = BitsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for BitPattern {
    type Error = BitsError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<BitPattern> for String {
    fn from(value: BitPattern) -> Self {
        value.to_string()
    }
}
