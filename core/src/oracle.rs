//! Append-only probabilistic membership for healing-vector fingerprints.
//!
//! A scalable Bloom filter: when the active slice reaches capacity a new,
//! larger slice with a tighter error rate is appended. Slice `i` targets
//! `error_rate * (1 - TIGHTENING) * TIGHTENING^i`, a geometric series whose sum
//! keeps the compound false positive rate under `error_rate`. There is no
//! removal: once a fingerprint has been vouched for, it stays vouched for.

use serde::{Deserialize, Serialize};

use crate::{CoreError, PublicVector, domain_hash};

const ORACLE_DOMAIN: &[u8] = b"aura-seal:oracle:v1";
const SNAPSHOT_VERSION: u32 = 1;

pub const DEFAULT_CAPACITY: usize = 1000;
pub const DEFAULT_ERROR_RATE: f64 = 0.001;
const GROWTH: usize = 2;
const TIGHTENING: f64 = 0.9;
const MIN_BITS: u64 = 64;

// Limits for snapshots read from disk.
const MAX_HASHES: u32 = 64;
const MAX_SLICE_BITS: u64 = 1 << 30;
const MAX_SLICES: usize = 32;
const MAX_INITIAL_CAPACITY: usize = 1 << 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BloomSlice {
    capacity: usize,
    num_hashes: u32,
    num_bits: u64,
    #[serde(with = "hex::serde")]
    bits: Vec<u8>,
    count: usize,
}

impl BloomSlice {
    fn with_rate(capacity: usize, error_rate: f64) -> Self {
        let n = capacity.max(1) as f64;
        let ln2 = std::f64::consts::LN_2;
        let num_bits = ((-n * error_rate.ln()) / (ln2 * ln2)).ceil() as u64;
        let num_bits = num_bits.max(MIN_BITS);
        let num_hashes = ((num_bits as f64 / n) * ln2).round().max(1.0) as u32;
        Self {
            capacity: capacity.max(1),
            num_hashes,
            num_bits,
            bits: vec![0; num_bits.div_ceil(8) as usize],
            count: 0,
        }
    }

    fn positions(&self, h1: u64, h2: u64) -> impl Iterator<Item = u64> + '_ {
        (0..u64::from(self.num_hashes))
            .map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % self.num_bits)
    }

    fn contains(&self, h1: u64, h2: u64) -> bool {
        self.positions(h1, h2).all(|bit| {
            self.bits
                .get((bit / 8) as usize)
                .is_some_and(|byte| byte & (1 << (bit % 8)) != 0)
        })
    }

    fn insert(&mut self, h1: u64, h2: u64) {
        let positions: Vec<u64> = self.positions(h1, h2).collect();
        for bit in positions {
            if let Some(byte) = self.bits.get_mut((bit / 8) as usize) {
                *byte |= 1 << (bit % 8);
            }
        }
        self.count += 1;
    }

    fn is_full(&self) -> bool {
        self.count >= self.capacity
    }

    fn is_well_formed(&self) -> bool {
        self.capacity > 0
            && self.count <= self.capacity
            && (1..=MAX_HASHES).contains(&self.num_hashes)
            && (MIN_BITS..=MAX_SLICE_BITS).contains(&self.num_bits)
            && self.bits.len() as u64 == self.num_bits.div_ceil(8)
    }
}

/// Kirsch-Mitzenmacher double hashing over one SHA-256 digest.
fn item_hashes(item: &[u8]) -> (u64, u64) {
    let digest = domain_hash(ORACLE_DOMAIN, &[item]);
    let mut h1 = [0u8; 8];
    let mut h2 = [0u8; 8];
    h1.copy_from_slice(&digest[..8]);
    h2.copy_from_slice(&digest[8..16]);
    (u64::from_le_bytes(h1), u64::from_le_bytes(h2) | 1)
}

#[derive(Debug, Clone, PartialEq)]
pub struct MembershipOracle {
    initial_capacity: usize,
    error_rate: f64,
    slices: Vec<BloomSlice>,
}

impl Default for MembershipOracle {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_ERROR_RATE)
    }
}

impl MembershipOracle {
    /// `error_rate` is clamped into `(0, 0.5]`.
    #[must_use]
    pub fn new(initial_capacity: usize, error_rate: f64) -> Self {
        let error_rate = if error_rate.is_finite() {
            error_rate.clamp(f64::MIN_POSITIVE, 0.5)
        } else {
            DEFAULT_ERROR_RATE
        };
        let initial_capacity = initial_capacity.max(1);
        Self {
            initial_capacity,
            error_rate,
            slices: vec![BloomSlice::with_rate(initial_capacity, error_rate * (1.0 - TIGHTENING))],
        }
    }

    /// Record an item. Returns `false` if it was (probably) already present.
    pub fn insert(&mut self, item: &[u8]) -> bool {
        let (h1, h2) = item_hashes(item);
        if self.slices.iter().any(|s| s.contains(h1, h2)) {
            return false;
        }

        if self.slices.last().is_none_or(BloomSlice::is_full) {
            let depth = self.slices.len();
            let capacity = self.initial_capacity.saturating_mul(GROWTH.saturating_pow(depth as u32));
            let rate = self.error_rate * (1.0 - TIGHTENING) * TIGHTENING.powi(depth as i32);
            self.slices.push(BloomSlice::with_rate(capacity, rate));
        }
        if let Some(active) = self.slices.last_mut() {
            active.insert(h1, h2);
        }
        true
    }

    #[must_use]
    pub fn contains(&self, item: &[u8]) -> bool {
        let (h1, h2) = item_hashes(item);
        self.slices.iter().any(|s| s.contains(h1, h2))
    }

    /// Register a healing vector by fingerprint.
    pub fn register(&mut self, vector: &PublicVector) -> bool {
        self.insert(vector.fingerprint().as_bytes())
    }

    /// True if the vector's fingerprint has been registered (up to the false
    /// positive bound).
    #[must_use]
    pub fn is_valid(&self, vector: &PublicVector) -> bool {
        self.contains(vector.fingerprint().as_bytes())
    }

    /// Number of distinct items recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slices.iter().map(|s| s.count).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn slice_count(&self) -> usize {
        self.slices.len()
    }

    /// Upper bound on the compound false positive rate at full capacity.
    #[must_use]
    pub fn false_positive_bound(&self) -> f64 {
        self.error_rate
    }

    #[must_use]
    pub fn snapshot(&self) -> OracleSnapshot {
        OracleSnapshot {
            version: SNAPSHOT_VERSION,
            initial_capacity: self.initial_capacity,
            error_rate: self.error_rate,
            slices: self.slices.clone(),
        }
    }

    pub fn restore(snapshot: OracleSnapshot) -> Result<Self, CoreError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(CoreError::MalformedSnapshot(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        if snapshot.slices.is_empty() {
            return Err(CoreError::MalformedSnapshot("no filter slices".to_string()));
        }
        if snapshot.slices.len() > MAX_SLICES {
            return Err(CoreError::MalformedSnapshot(format!(
                "{} slices exceeds the limit of {MAX_SLICES}",
                snapshot.slices.len()
            )));
        }
        if !(1..=MAX_INITIAL_CAPACITY).contains(&snapshot.initial_capacity) {
            return Err(CoreError::MalformedSnapshot(format!(
                "initial capacity {} out of range",
                snapshot.initial_capacity
            )));
        }
        if !(snapshot.error_rate.is_finite()
            && snapshot.error_rate > 0.0
            && snapshot.error_rate <= 0.5)
        {
            return Err(CoreError::MalformedSnapshot(format!(
                "invalid error rate {}",
                snapshot.error_rate
            )));
        }
        if let Some(index) = snapshot.slices.iter().position(|s| !s.is_well_formed()) {
            return Err(CoreError::MalformedSnapshot(format!(
                "slice {index} has inconsistent sizing"
            )));
        }
        Ok(Self {
            initial_capacity: snapshot.initial_capacity,
            error_rate: snapshot.error_rate,
            slices: snapshot.slices,
        })
    }
}

/// Serializable form of the oracle, persisted by the key store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleSnapshot {
    version: u32,
    initial_capacity: usize,
    error_rate: f64,
    slices: Vec<BloomSlice>,
}
