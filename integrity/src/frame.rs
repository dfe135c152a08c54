//! Protected reference frame.
//!
//! ```text
//! +------+---+--------+---------+--------+----------+
//! | AURF | v | seg u16| len u32 | sha256 | hdr csum |   51-byte header
//! +------+---+--------+---------+--------+----------+
//! | data[0] | csum | data[1] | csum | ... | parity | csum |
//! ```
//!
//! Data segments are zero-padded to the segment size. The parity segment is
//! the XOR of every data segment, so any single lost data segment can be
//! rebuilt from the others.

use crate::{IntegrityError, sha256, short_checksum};

pub const DEFAULT_SEGMENT_SIZE: usize = 64;

const MAGIC: [u8; 4] = *b"AURF";
const VERSION: u8 = 1;
const HEADER_DOMAIN: &[u8] = b"aura-seal:frame-header:v1";
const SEGMENT_DOMAIN: &[u8] = b"aura-seal:frame-segment:v1";
const CHECKSUM_LEN: usize = 8;
const HEADER_BODY_LEN: usize = 4 + 1 + 2 + 4 + 32;
const HEADER_LEN: usize = HEADER_BODY_LEN + CHECKSUM_LEN;
/// Magic bytes this close to `AURF` still mark a (damaged) frame.
const MAGIC_TOLERANCE_BITS: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    bytes: Vec<u8>,
    intact: bool,
}

/// Parsed view over a framed reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedFrame {
    segment_size: usize,
    payload_len: usize,
    digest: [u8; 32],
    header_intact: bool,
    /// Data segments followed by the parity segment.
    segments: Vec<Segment>,
}

/// Outcome of reassembling the payload from a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Reassembly {
    pub payload: Vec<u8>,
    pub repaired: Vec<usize>,
    pub unrecoverable: Vec<usize>,
}

fn segment_checksum(index: usize, bytes: &[u8]) -> [u8; CHECKSUM_LEN] {
    short_checksum(SEGMENT_DOMAIN, &[&(index as u32).to_be_bytes(), bytes])
}

fn body_len(segment_size: usize, payload_len: usize) -> usize {
    (payload_len.div_ceil(segment_size) + 1) * (segment_size + CHECKSUM_LEN)
}

impl ProtectedFrame {
    /// Wrap `payload` in a recovery frame.
    pub fn protect(payload: &[u8], segment_size: usize) -> Result<Vec<u8>, IntegrityError> {
        let max = usize::from(u16::MAX);
        if segment_size == 0 || segment_size > max {
            return Err(IntegrityError::InvalidSegmentSize {
                got: segment_size,
                max,
            });
        }
        let payload_len =
            u32::try_from(payload.len()).map_err(|_| IntegrityError::PayloadTooLarge(payload.len()))?;

        let mut out = Vec::with_capacity(HEADER_LEN + body_len(segment_size, payload.len()));
        out.extend_from_slice(&MAGIC);
        out.push(VERSION);
        out.extend_from_slice(&(segment_size as u16).to_be_bytes());
        out.extend_from_slice(&payload_len.to_be_bytes());
        out.extend_from_slice(&sha256(payload));
        let header_sum = short_checksum(HEADER_DOMAIN, &[&out[..HEADER_BODY_LEN]]);
        out.extend_from_slice(&header_sum);

        let mut parity = vec![0u8; segment_size];
        let mut index = 0;
        for chunk in payload.chunks(segment_size) {
            let mut segment = chunk.to_vec();
            segment.resize(segment_size, 0);
            for (p, b) in parity.iter_mut().zip(&segment) {
                *p ^= b;
            }
            out.extend_from_slice(&segment);
            out.extend_from_slice(&segment_checksum(index, &segment));
            index += 1;
        }
        out.extend_from_slice(&parity);
        out.extend_from_slice(&segment_checksum(index, &parity));
        Ok(out)
    }

    /// Parse a reference. `None` means it is not a frame at all.
    ///
    /// A damaged header falls back to `fallback_segment_size` when its own
    /// geometry does not fit the reference length.
    #[must_use]
    pub fn parse(reference: &[u8], fallback_segment_size: usize) -> Option<Self> {
        let header = reference.get(..HEADER_LEN)?;
        let magic_distance: u32 = header[..4]
            .iter()
            .zip(&MAGIC)
            .map(|(a, b)| (a ^ b).count_ones())
            .sum();
        if magic_distance > MAGIC_TOLERANCE_BITS {
            return None;
        }

        let segment_size = usize::from(u16::from_be_bytes([header[5], header[6]]));
        let payload_len =
            u32::from_be_bytes([header[7], header[8], header[9], header[10]]) as usize;
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&header[11..HEADER_BODY_LEN]);

        let body = &reference[HEADER_LEN..];
        let checksum_ok = short_checksum(HEADER_DOMAIN, &[&header[..HEADER_BODY_LEN]])
            == header[HEADER_BODY_LEN..];
        let geometry_ok = segment_size > 0 && body.len() == body_len(segment_size, payload_len);
        let header_intact = magic_distance == 0 && header[4] == VERSION && checksum_ok && geometry_ok;

        let (segment_size, payload_len) = if geometry_ok {
            (segment_size, payload_len)
        } else {
            let stride = fallback_segment_size.max(1) + CHECKSUM_LEN;
            let count = body.len() / stride;
            if body.len() % stride != 0 || count == 0 {
                return Some(Self {
                    segment_size: fallback_segment_size.max(1),
                    payload_len: 0,
                    digest,
                    header_intact: false,
                    segments: Vec::new(),
                });
            }
            let size = fallback_segment_size.max(1);
            (size, (count - 1) * size)
        };

        let segments = body
            .chunks(segment_size + CHECKSUM_LEN)
            .enumerate()
            .map(|(index, chunk)| {
                let (bytes, sum) = chunk.split_at(segment_size.min(chunk.len()));
                Segment {
                    bytes: bytes.to_vec(),
                    intact: sum == segment_checksum(index, bytes),
                }
            })
            .collect();

        Some(Self {
            segment_size,
            payload_len,
            digest,
            header_intact,
            segments,
        })
    }

    #[must_use]
    pub fn header_intact(&self) -> bool {
        self.header_intact
    }

    #[must_use]
    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    /// SHA-256 of the original payload, as recorded in the header.
    #[must_use]
    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    /// Data segments plus parity.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Indices of segments whose checksum fails. The parity segment is last.
    #[must_use]
    pub fn damaged_segments(&self) -> Vec<usize> {
        self.segments
            .iter()
            .enumerate()
            .filter_map(|(i, s)| (!s.intact).then_some(i))
            .collect()
    }

    pub(crate) fn reassemble(&self) -> Reassembly {
        let Some((parity, data)) = self.segments.split_last() else {
            return Reassembly {
                payload: Vec::new(),
                repaired: Vec::new(),
                unrecoverable: Vec::new(),
            };
        };

        let damaged: Vec<usize> = data
            .iter()
            .enumerate()
            .filter_map(|(i, s)| (!s.intact).then_some(i))
            .collect();

        let mut chunks: Vec<Vec<u8>> = data.iter().map(|s| s.bytes.clone()).collect();
        let mut repaired = Vec::new();
        let mut unrecoverable = Vec::new();

        match damaged.as_slice() {
            [] => {}
            [lost] if parity.intact => {
                let mut rebuilt = parity.bytes.clone();
                for (i, segment) in data.iter().enumerate() {
                    if i != *lost {
                        for (r, b) in rebuilt.iter_mut().zip(&segment.bytes) {
                            *r ^= b;
                        }
                    }
                }
                chunks[*lost] = rebuilt;
                repaired.push(*lost);
            }
            lost => unrecoverable.extend_from_slice(lost),
        }

        let mut payload: Vec<u8> = chunks.concat();
        payload.truncate(self.payload_len);
        Reassembly {
            payload,
            repaired,
            unrecoverable,
        }
    }
}
