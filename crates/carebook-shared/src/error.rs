use thiserror::Error;

use crate::types::VerificationStatus;

/// Failures surfaced by scheduling, booking, ledger and verification
/// operations.
///
/// Messages are stable and user-facing; none of them carry internal
/// identifiers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("User not found")]
    NotFound,

    #[error("Invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("Doctor not found or not verified")]
    DoctorUnavailable,

    #[error("No availability has been set by the doctor")]
    NoAvailabilityConfigured,

    #[error("This time slot is already booked")]
    SlotConflict,

    #[error("Insufficient credits to book an appointment")]
    InsufficientCredit,

    #[error("Failed to create video session")]
    VideoSessionError,

    #[error("Failed to transfer credits")]
    LedgerTransferFailed,

    #[error("Cannot change verification status from {from} to {to}")]
    InvalidTransition {
        from: VerificationStatus,
        to: VerificationStatus,
    },
}
