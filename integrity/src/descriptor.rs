//! Data and process-descriptor encodings used for context-bound admission.

use aura_types::BitVector;

use crate::{
    BinaryEncodingProcessor, EncodingPair, ExecutionCoordinate, ExecutionCoordinateMapper,
    IntegrityError, sha256,
};

const BINDING_LEN: usize = 32;

/// A process (algorithm) descriptor bound to the data it may execute on.
///
/// The binding is the SHA-256 of that data, so the handshake between a
/// recovered data payload and a recovered descriptor only passes when both
/// survived intact and belong together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDescriptor {
    logic: Vec<u8>,
    binding: [u8; BINDING_LEN],
}

impl ProcessDescriptor {
    #[must_use]
    pub fn bound_to(logic: impl Into<Vec<u8>>, data: &[u8]) -> Self {
        Self {
            logic: logic.into(),
            binding: sha256(data),
        }
    }

    #[must_use]
    pub fn logic(&self) -> &[u8] {
        &self.logic
    }

    #[must_use]
    pub fn binding_vector(&self) -> BitVector {
        BitVector::from_bytes(&self.binding)
    }

    /// The binding a descriptor for `data` would carry, as bits.
    #[must_use]
    pub fn binding_for(data: &[u8]) -> BitVector {
        BitVector::from_bytes(&sha256(data))
    }

    /// `u32be(len(logic)) || logic || binding`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, IntegrityError> {
        let prefix = length_prefix(self.logic.len())?;
        let mut out = Vec::with_capacity(4 + self.logic.len() + BINDING_LEN);
        out.extend_from_slice(&prefix);
        out.extend_from_slice(&self.logic);
        out.extend_from_slice(&self.binding);
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IntegrityError> {
        let (len, rest) = bytes
            .split_first_chunk::<4>()
            .ok_or(IntegrityError::MalformedDescriptor("missing length prefix"))?;
        let len = u32::from_be_bytes(*len) as usize;
        if rest.len() != len + BINDING_LEN {
            return Err(IntegrityError::MalformedDescriptor("length prefix does not match"));
        }
        let (logic, binding) = rest.split_at(len);
        let mut out = [0u8; BINDING_LEN];
        out.copy_from_slice(binding);
        Ok(Self {
            logic: logic.to_vec(),
            binding: out,
        })
    }
}

fn length_prefix(len: usize) -> Result<[u8; 4], IntegrityError> {
    u32::try_from(len)
        .map(u32::to_be_bytes)
        .map_err(|_| IntegrityError::LogicTooLarge(len))
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataEncoding {
    pub pair: EncodingPair,
    /// Raw agreement between the two patterned copies.
    pub recovery_capability: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlgorithmEncoding {
    pub pair: EncodingPair,
    /// Coordinate of the execution/context encodings themselves.
    pub coordinate: ExecutionCoordinate,
}

impl BinaryEncodingProcessor {
    #[must_use]
    pub fn encode_data(&self, payload: &[u8]) -> DataEncoding {
        let p = self.patterns();
        let pair = self.encode(payload, &p.data_primary, &p.data_secondary);
        DataEncoding {
            recovery_capability: pair.raw_agreement(),
            pair,
        }
    }

    pub fn encode_algorithm(
        &self,
        descriptor: &ProcessDescriptor,
    ) -> Result<AlgorithmEncoding, IntegrityError> {
        let p = self.patterns();
        let pair = self.encode(
            &descriptor.to_bytes()?,
            &p.algorithm_execution,
            &p.algorithm_context,
        );
        let coordinate =
            ExecutionCoordinateMapper.map(pair.primary().bits(), pair.secondary().bits());
        Ok(AlgorithmEncoding { pair, coordinate })
    }
}
