use aura_types::BitVector;
use serde::Serialize;

const ALIGNED_FAULT_TOLERANCE: f64 = 0.9;
const UNALIGNED_FAULT_TOLERANCE: f64 = 0.1;

/// Admission coordinate for a data/process pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExecutionCoordinate {
    pub x: u64,
    pub y: u64,
    /// Non-degenerate: at least one vector has a set bit.
    pub context_binding: bool,
    pub alignment: bool,
    pub fault_tolerance: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionCoordinateMapper;

impl ExecutionCoordinateMapper {
    /// Project both vectors onto their population counts. Aligned when bound
    /// and both axes coincide.
    #[must_use]
    pub fn map(&self, execution: &BitVector, context: &BitVector) -> ExecutionCoordinate {
        let x = execution.count_ones();
        let y = context.count_ones();
        let context_binding = x + y > 0;
        let alignment = context_binding && x == y;
        ExecutionCoordinate {
            x,
            y,
            context_binding,
            alignment,
            fault_tolerance: if alignment {
                ALIGNED_FAULT_TOLERANCE
            } else {
                UNALIGNED_FAULT_TOLERANCE
            },
        }
    }
}
