use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a single attempt session.
///
/// Status only moves forward: `Created → Active → Submitting → Submitted`,
/// with `Failed` reachable from `Submitting` when the result cannot be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AttemptStatus {
    Created = 0,
    Active = 1,
    Submitting = 2,
    Submitted = 3,
    Failed = 4,
}

impl AttemptStatus {
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode a status previously produced by [`AttemptStatus::as_u8`].
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Created),
            1 => Some(Self::Active),
            2 => Some(Self::Submitting),
            3 => Some(Self::Submitted),
            4 => Some(Self::Failed),
            _ => None,
        }
    }

    /// Terminal states never change again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Submitted | Self::Failed)
    }

    /// Whether `next` is a legal forward step from `self`.
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Active)
                | (Self::Active, Self::Submitting)
                | (Self::Submitting, Self::Submitted | Self::Failed)
        )
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Created => "created",
            Self::Active => "active",
            Self::Submitting => "submitting",
            Self::Submitted => "submitted",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// What caused a submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptTrigger {
    /// The student pressed submit.
    Manual,
    /// The countdown reached zero.
    TimerExpiry,
}

impl fmt::Display for AttemptTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => f.write_str("manual"),
            Self::TimerExpiry => f.write_str("timer_expiry"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrips_through_u8() {
        for status in [
            AttemptStatus::Created,
            AttemptStatus::Active,
            AttemptStatus::Submitting,
            AttemptStatus::Submitted,
            AttemptStatus::Failed,
        ] {
            assert_eq!(AttemptStatus::from_u8(status.as_u8()), Some(status));
        }
        assert_eq!(AttemptStatus::from_u8(9), None);
    }

    #[test]
    fn status_never_regresses() {
        assert!(AttemptStatus::Active.can_advance_to(AttemptStatus::Submitting));
        assert!(AttemptStatus::Submitting.can_advance_to(AttemptStatus::Failed));
        assert!(!AttemptStatus::Submitting.can_advance_to(AttemptStatus::Active));
        assert!(!AttemptStatus::Submitted.can_advance_to(AttemptStatus::Submitting));
        assert!(!AttemptStatus::Active.can_advance_to(AttemptStatus::Submitted));
    }
}
