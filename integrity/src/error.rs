use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    /// The reference carries no recovery frame, so there is nothing to
    /// reconstruct from.
    #[error("reference is not a protected frame")]
    Unframed,
    #[error("segment size must be between 1 and {max} bytes, got {got}")]
    InvalidSegmentSize { got: usize, max: usize },
    #[error("payload of {0} bytes is too large to frame")]
    PayloadTooLarge(usize),
    #[error("process logic of {0} bytes does not fit a 32-bit length prefix")]
    LogicTooLarge(usize),
    #[error("malformed process descriptor: {0}")]
    MalformedDescriptor(&'static str),
}
