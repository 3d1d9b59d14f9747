//! User records: first sign-in, lookups, onboarding.

use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use carebook_shared::{CoreError, Role, VerificationStatus};

use crate::codec::{not_found, parse_enum, parse_ts, parse_uuid, ts};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{DoctorProfile, User};

pub(crate) const USER_COLUMNS: &str = "id, external_id, email, name, role, specialty, experience,
     credential_url, description, verification_status, credit, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Return the user bound to `external_id`, creating an `UNASSIGNED`
    /// user with zero credit on first sign-in.
    pub fn ensure_user(&self, external_id: &str, email: &str, name: Option<&str>) -> Result<User> {
        let now = ts(&Utc::now());
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO users (id, external_id, email, name, role, credit, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)",
            params![
                Uuid::new_v4().to_string(),
                external_id,
                email,
                name,
                Role::Unassigned.as_str(),
                now,
            ],
        )?;

        if inserted > 0 {
            tracing::info!(external_id, "created user on first sign-in");
        }

        self.get_user_by_external_id(external_id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_user(&self, id: Uuid) -> Result<User> {
        user_by_id(self.conn(), id)
    }

    pub fn get_user_by_external_id(&self, external_id: &str) -> Result<User> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE external_id = ?1"),
                params![external_id],
                row_to_user,
            )
            .map_err(not_found)
    }

    /// Resolve the user bound to `external_id` and require `role`.
    ///
    /// A missing user and a user with another role both fail with
    /// [`CoreError::NotFound`], except that admin-only callers get
    /// [`CoreError::Unauthorized`].
    pub fn require_role(&self, external_id: &str, role: Role) -> Result<User> {
        let denied = match role {
            Role::Admin => CoreError::Unauthorized,
            _ => CoreError::NotFound,
        };
        match self.get_user_by_external_id(external_id) {
            Ok(user) if user.role == role => Ok(user),
            Ok(_) | Err(StoreError::NotFound) => Err(denied.into()),
            Err(e) => Err(e),
        }
    }

    // ------------------------------------------------------------------
    // Onboarding
    // ------------------------------------------------------------------

    pub fn onboard_patient(&mut self, user_id: Uuid) -> Result<User> {
        let tx = self.write_tx()?;
        ensure_unassigned(&tx, user_id)?;
        tx.execute(
            "UPDATE users SET role = ?1, updated_at = ?2 WHERE id = ?3",
            params![Role::Patient.as_str(), ts(&Utc::now()), user_id.to_string()],
        )?;
        let user = user_by_id(&tx, user_id)?;
        tx.commit()?;

        tracing::info!(user = %user_id, "onboarded patient");
        Ok(user)
    }

    /// Register the user as a doctor awaiting admin verification.
    pub fn onboard_doctor(&mut self, user_id: Uuid, profile: &DoctorProfile) -> Result<User> {
        profile.validate()?;

        let tx = self.write_tx()?;
        ensure_unassigned(&tx, user_id)?;
        tx.execute(
            "UPDATE users
             SET role = ?1, specialty = ?2, experience = ?3, credential_url = ?4,
                 description = ?5, verification_status = ?6, updated_at = ?7
             WHERE id = ?8",
            params![
                Role::Doctor.as_str(),
                profile.specialty.trim(),
                profile.experience,
                profile.credential_url.trim(),
                profile.description.trim(),
                VerificationStatus::Pending.as_str(),
                ts(&Utc::now()),
                user_id.to_string(),
            ],
        )?;
        let user = user_by_id(&tx, user_id)?;
        tx.commit()?;

        tracing::info!(user = %user_id, specialty = %profile.specialty, "onboarded doctor, pending verification");
        Ok(user)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn user_by_id(conn: &Connection, id: Uuid) -> Result<User> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id.to_string()],
        row_to_user,
    )
    .map_err(not_found)
}

/// Surface a missing user row as the domain's `NotFound`.
pub(crate) fn missing_user(e: StoreError) -> StoreError {
    match e {
        StoreError::NotFound => StoreError::Core(CoreError::NotFound),
        other => other,
    }
}

fn ensure_unassigned(conn: &Connection, user_id: Uuid) -> Result<()> {
    let user = user_by_id(conn, user_id).map_err(missing_user)?;
    if user.role.is_onboarded() {
        return Err(CoreError::InvalidInput("a role has already been selected").into());
    }
    Ok(())
}

/// Map a `rusqlite::Row` selected with [`USER_COLUMNS`] to a [`User`].
pub(crate) fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let role: String = row.get(4)?;
    let status: Option<String> = row.get(9)?;
    let created: String = row.get(11)?;
    let updated: String = row.get(12)?;

    Ok(User {
        id: parse_uuid(0, &id)?,
        external_id: row.get(1)?,
        email: row.get(2)?,
        name: row.get(3)?,
        role: parse_enum(4, &role, Role::parse)?,
        specialty: row.get(5)?,
        experience: row.get(6)?,
        credential_url: row.get(7)?,
        description: row.get(8)?,
        verification_status: status
            .map(|s| parse_enum(9, &s, VerificationStatus::parse))
            .transpose()?,
        credit: row.get(10)?,
        created_at: parse_ts(11, &created)?,
        updated_at: parse_ts(12, &updated)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::testing::open_temp;

    fn profile() -> DoctorProfile {
        DoctorProfile {
            specialty: "Cardiology".into(),
            experience: 5,
            credential_url: "https://licences.example.org/abc".into(),
            description: "Cardiologist with five years of hospital practice.".into(),
        }
    }

    #[test]
    fn ensure_user_is_idempotent() {
        let (_dir, db) = open_temp();
        let first = db.ensure_user("sub_1", "a@example.com", Some("Ada")).unwrap();
        let second = db.ensure_user("sub_1", "changed@example.com", None).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.email, "a@example.com");
        assert_eq!(first.role, Role::Unassigned);
        assert_eq!(first.credit, 0);
    }

    #[test]
    fn onboard_patient_sets_role_once() {
        let (_dir, mut db) = open_temp();
        let user = db.ensure_user("sub_p", "p@example.com", None).unwrap();

        let patient = db.onboard_patient(user.id).unwrap();
        assert_eq!(patient.role, Role::Patient);
        assert_eq!(patient.verification_status, None);

        let err = db.onboard_doctor(user.id, &profile()).unwrap_err();
        assert!(matches!(err.core(), Some(CoreError::InvalidInput(_))));
    }

    #[test]
    fn onboard_doctor_starts_pending() {
        let (_dir, mut db) = open_temp();
        let user = db.ensure_user("sub_d", "d@example.com", Some("Dr Who")).unwrap();

        let doctor = db.onboard_doctor(user.id, &profile()).unwrap();
        assert_eq!(doctor.role, Role::Doctor);
        assert_eq!(doctor.verification_status, Some(VerificationStatus::Pending));
        assert_eq!(doctor.experience, Some(5));
        assert!(!doctor.is_bookable_doctor());
    }

    #[test]
    fn onboard_doctor_rejects_invalid_profile() {
        let (_dir, mut db) = open_temp();
        let user = db.ensure_user("sub_x", "x@example.com", None).unwrap();
        let mut bad = profile();
        bad.experience = 40;

        assert!(db.onboard_doctor(user.id, &bad).is_err());
        assert_eq!(db.get_user(user.id).unwrap().role, Role::Unassigned);
    }

    #[test]
    fn require_role_distinguishes_admin() {
        let (_dir, mut db) = open_temp();
        let user = db.ensure_user("sub_r", "r@example.com", None).unwrap();
        db.onboard_patient(user.id).unwrap();

        assert!(db.require_role("sub_r", Role::Patient).is_ok());
        let err = db.require_role("sub_r", Role::Doctor).unwrap_err();
        assert_eq!(err.core(), Some(&CoreError::NotFound));
        let err = db.require_role("sub_r", Role::Admin).unwrap_err();
        assert_eq!(err.core(), Some(&CoreError::Unauthorized));
        let err = db.require_role("nobody", Role::Patient).unwrap_err();
        assert_eq!(err.core(), Some(&CoreError::NotFound));
    }
}
