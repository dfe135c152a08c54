//! Identity session lifecycle.
//!
//! ```text
//! BIRTH -> SEALED -> { VERIFIED, HEALING, BREACHED }
//!                        HEALING -> VERIFIED | BREACHED
//! ```
//!
//! `Breached` is terminal: the only way forward is a new birth.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityState {
    Birth,
    Sealed,
    Verified,
    Healing,
    Breached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityEvent {
    /// A seal record was produced.
    Sealed,
    /// A record verified under both vectors.
    Verified,
    /// One of the presented vectors did not match the identity.
    VectorMismatch,
    /// Healing produced a usable vector and the record verified under it.
    Healed,
    /// Neither vector was membership-valid.
    BothVectorsInvalid,
}

impl IdentityState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Birth => "birth",
            Self::Sealed => "sealed",
            Self::Verified => "verified",
            Self::Healing => "healing",
            Self::Breached => "breached",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Breached)
    }

    /// Next state for `event`, or `None` if the transition is not allowed.
    #[must_use]
    pub const fn apply(self, event: IdentityEvent) -> Option<Self> {
        use IdentityEvent as E;
        use IdentityState as S;

        match (self, event) {
            (S::Birth | S::Sealed | S::Verified, E::Sealed) => Some(S::Sealed),
            (S::Sealed | S::Verified, E::Verified) => Some(S::Verified),
            (S::Sealed | S::Verified, E::VectorMismatch) => Some(S::Healing),
            (S::Healing, E::Healed) => Some(S::Verified),
            (S::Healing, E::BothVectorsInvalid) => Some(S::Breached),
            _ => None,
        }
    }
}

impl fmt::Display for IdentityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{IdentityEvent as E, IdentityState as S};

    #[test]
    fn happy_path() {
        let s = S::Birth.apply(E::Sealed).unwrap();
        assert_eq!(s, S::Sealed);
        let s = s.apply(E::Verified).unwrap();
        assert_eq!(s, S::Verified);
        assert_eq!(s.apply(E::Sealed), Some(S::Sealed));
    }

    #[test]
    fn healing_resolves_to_verified_or_breached() {
        let healing = S::Sealed.apply(E::VectorMismatch).unwrap();
        assert_eq!(healing, S::Healing);
        assert_eq!(healing.apply(E::Healed), Some(S::Verified));
        assert_eq!(healing.apply(E::BothVectorsInvalid), Some(S::Breached));
    }

    #[test]
    fn cannot_verify_before_sealing() {
        assert_eq!(S::Birth.apply(E::Verified), None);
        assert_eq!(S::Birth.apply(E::VectorMismatch), None);
    }

    #[test]
    fn breached_is_terminal() {
        assert!(S::Breached.is_terminal());
        for event in [
            E::Sealed,
            E::Verified,
            E::VectorMismatch,
            E::Healed,
            E::BothVectorsInvalid,
        ] {
            assert_eq!(S::Breached.apply(event), None);
        }
    }
}
