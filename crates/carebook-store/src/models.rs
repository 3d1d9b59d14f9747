//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use carebook_shared::constants::{
    MAX_DESCRIPTION_LEN, MAX_EXPERIENCE_YEARS, MIN_DESCRIPTION_LEN, MIN_EXPERIENCE_YEARS,
};
use carebook_shared::{
    AppointmentStatus, AvailabilityStatus, CoreError, Role, TransactionType, VerificationStatus,
};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A patient, doctor or admin.  Doctor-only fields are `None` for everyone
/// else.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    /// Subject id issued by the identity provider.
    pub external_id: String,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub specialty: Option<String>,
    /// Years of practice.
    pub experience: Option<u32>,
    pub credential_url: Option<String>,
    pub description: Option<String>,
    pub verification_status: Option<VerificationStatus>,
    /// Materialized sum of the user's ledger entries.  Never negative.
    pub credit: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A doctor that patients may see and book.
    pub fn is_bookable_doctor(&self) -> bool {
        self.role == Role::Doctor && self.verification_status == Some(VerificationStatus::Verified)
    }
}

/// Profile submitted by a user onboarding as a doctor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DoctorProfile {
    pub specialty: String,
    pub experience: u32,
    pub credential_url: String,
    pub description: String,
}

impl DoctorProfile {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.specialty.trim().is_empty() {
            return Err(CoreError::InvalidInput("specialty is required"));
        }
        if !(MIN_EXPERIENCE_YEARS..=MAX_EXPERIENCE_YEARS).contains(&self.experience) {
            return Err(CoreError::InvalidInput(
                "experience must be between 1 and 15 years",
            ));
        }
        let url = self.credential_url.trim();
        if !(url.starts_with("https://") || url.starts_with("http://")) || url.len() < 10 {
            return Err(CoreError::InvalidInput("credential URL must be a valid URL"));
        }
        let len = self.description.trim().chars().count();
        if !(MIN_DESCRIPTION_LEN..=MAX_DESCRIPTION_LEN).contains(&len) {
            return Err(CoreError::InvalidInput(
                "description must be between 20 and 1000 characters",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Availability
// ---------------------------------------------------------------------------

/// A doctor's recurring daily window.  Only the time-of-day part of
/// `start_time` / `end_time` is meaningful.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Availability {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AvailabilityStatus,
    /// Set once an appointment has consumed this row; such rows survive
    /// availability rewrites.
    pub appointment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Appointment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub patient_description: Option<String>,
    /// Session id returned by the video provider.
    pub video_session_id: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Credit ledger
// ---------------------------------------------------------------------------

/// One immutable ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreditTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Signed amount; negative for debits.
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Plan id, set on monthly allocation entries.
    pub package_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Balances of both parties after a transfer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Balances {
    pub from_balance: i64,
    pub to_balance: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> DoctorProfile {
        DoctorProfile {
            specialty: "Dermatology".into(),
            experience: 7,
            credential_url: "https://registry.example.org/licence/123".into(),
            description: "Board certified dermatologist with a clinical focus.".into(),
        }
    }

    #[test]
    fn valid_profile_passes() {
        assert!(profile().validate().is_ok());
    }

    #[test]
    fn profile_bounds_are_enforced() {
        let mut p = profile();
        p.experience = 0;
        assert!(p.validate().is_err());
        p.experience = 16;
        assert!(p.validate().is_err());

        let mut p = profile();
        p.credential_url = "ftp://x".into();
        assert!(p.validate().is_err());

        let mut p = profile();
        p.description = "too short".into();
        assert!(p.validate().is_err());

        let mut p = profile();
        p.specialty = "  ".into();
        assert!(p.validate().is_err());
    }
}
