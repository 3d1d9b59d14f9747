//! Doctor verification workflow.
//!
//! ```text
//!   PENDING --approve/reinstate--> VERIFIED
//!   PENDING --reject-------------> REJECTED
//!   VERIFIED --suspend-----------> PENDING
//! ```
//!
//! `REJECTED` has no outgoing edge. Transitions only change the status;
//! suspending a doctor leaves their appointments and availability alone.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::VerificationStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationAction {
    Approve,
    Reject,
    Suspend,
    Reinstate,
}

impl VerificationAction {
    /// Status the action moves a doctor into.
    pub fn target(&self) -> VerificationStatus {
        match self {
            VerificationAction::Approve | VerificationAction::Reinstate => {
                VerificationStatus::Verified
            }
            VerificationAction::Reject => VerificationStatus::Rejected,
            VerificationAction::Suspend => VerificationStatus::Pending,
        }
    }
}

/// Apply `action` to a doctor currently in `from`.
pub fn transition(
    from: VerificationStatus,
    action: VerificationAction,
) -> Result<VerificationStatus, CoreError> {
    use VerificationAction::*;
    use VerificationStatus::*;

    match (from, action) {
        (Pending, Approve | Reinstate) => Ok(Verified),
        (Pending, Reject) => Ok(Rejected),
        (Verified, Suspend) => Ok(Pending),
        (from, action) => Err(CoreError::InvalidTransition {
            from,
            to: action.target(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_can_be_approved_or_rejected() {
        assert_eq!(
            transition(VerificationStatus::Pending, VerificationAction::Approve),
            Ok(VerificationStatus::Verified)
        );
        assert_eq!(
            transition(VerificationStatus::Pending, VerificationAction::Reject),
            Ok(VerificationStatus::Rejected)
        );
    }

    #[test]
    fn suspend_and_reinstate_round_trip() {
        let suspended =
            transition(VerificationStatus::Verified, VerificationAction::Suspend).unwrap();
        assert_eq!(suspended, VerificationStatus::Pending);
        assert_eq!(
            transition(suspended, VerificationAction::Reinstate),
            Ok(VerificationStatus::Verified)
        );
    }

    #[test]
    fn rejected_is_terminal() {
        for action in [
            VerificationAction::Approve,
            VerificationAction::Reject,
            VerificationAction::Suspend,
            VerificationAction::Reinstate,
        ] {
            assert!(transition(VerificationStatus::Rejected, action).is_err());
        }
    }

    #[test]
    fn verified_cannot_be_rejected_directly() {
        let err = transition(VerificationStatus::Verified, VerificationAction::Reject).unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidTransition {
                from: VerificationStatus::Verified,
                to: VerificationStatus::Rejected,
            }
        );
        assert!(transition(VerificationStatus::Pending, VerificationAction::Suspend).is_err());
    }
}
