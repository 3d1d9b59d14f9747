//! Doctor directory and the admin verification workflow.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use carebook_shared::verification::{transition, VerificationAction};
use carebook_shared::{CoreError, Role, VerificationStatus};

use crate::codec::ts;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::User;
use crate::users::{row_to_user, user_by_id, USER_COLUMNS};

impl Database {
    // ------------------------------------------------------------------
    // Directory
    // ------------------------------------------------------------------

    /// Verified doctors practising `specialty`, ordered by name.
    pub fn list_doctors_by_specialty(&self, specialty: &str) -> Result<Vec<User>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {USER_COLUMNS}
             FROM users
             WHERE role = ?1 AND verification_status = ?2 AND specialty = ?3
             ORDER BY name ASC"
        ))?;
        let rows = stmt.query_map(
            params![
                Role::Doctor.as_str(),
                VerificationStatus::Verified.as_str(),
                specialty.trim()
            ],
            row_to_user,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// A doctor visible to patients. Unverified doctors are reported as
    /// unavailable, same as unknown ids.
    pub fn get_verified_doctor(&self, doctor_id: Uuid) -> Result<User> {
        match user_by_id(self.conn(), doctor_id) {
            Ok(doctor) if doctor.is_bookable_doctor() => Ok(doctor),
            Ok(_) | Err(StoreError::NotFound) => Err(CoreError::DoctorUnavailable.into()),
            Err(e) => Err(e),
        }
    }

    // ------------------------------------------------------------------
    // Admin queue
    // ------------------------------------------------------------------

    /// Doctors awaiting review, newest applications first.
    pub fn list_pending_doctors(&self) -> Result<Vec<User>> {
        self.doctors_with_status(VerificationStatus::Pending, "DESC")
    }

    /// Verified doctors, oldest first.
    pub fn list_verified_doctors(&self) -> Result<Vec<User>> {
        self.doctors_with_status(VerificationStatus::Verified, "ASC")
    }

    fn doctors_with_status(&self, status: VerificationStatus, order: &str) -> Result<Vec<User>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {USER_COLUMNS}
             FROM users
             WHERE role = ?1 AND verification_status = ?2
             ORDER BY created_at {order}, rowid {order}"
        ))?;
        let rows = stmt.query_map(
            params![Role::Doctor.as_str(), status.as_str()],
            row_to_user,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Apply an admin decision to a doctor's verification status.
    ///
    /// Only the status column changes.
    pub fn update_verification(
        &mut self,
        admin_id: Uuid,
        doctor_id: Uuid,
        action: VerificationAction,
    ) -> Result<User> {
        let tx = self.write_tx()?;

        match user_by_id(&tx, admin_id) {
            Ok(user) if user.role == Role::Admin => {}
            Ok(_) | Err(StoreError::NotFound) => return Err(CoreError::Unauthorized.into()),
            Err(e) => return Err(e),
        }

        let doctor = match user_by_id(&tx, doctor_id) {
            Ok(user) if user.role == Role::Doctor => user,
            Ok(_) | Err(StoreError::NotFound) => return Err(CoreError::NotFound.into()),
            Err(e) => return Err(e),
        };
        let from = doctor
            .verification_status
            .unwrap_or(VerificationStatus::Pending);
        let to = transition(from, action)?;

        tx.execute(
            "UPDATE users SET verification_status = ?1, updated_at = ?2 WHERE id = ?3",
            params![to.as_str(), ts(&Utc::now()), doctor_id.to_string()],
        )?;
        let doctor = user_by_id(&tx, doctor_id)?;
        tx.commit()?;

        tracing::info!(admin = %admin_id, doctor = %doctor_id, %from, %to, "verification status changed");
        Ok(doctor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::testing::{open_temp, patient, seed_user};
    use chrono::{Duration, TimeZone};

    fn doctor_at(db: &Database, status: VerificationStatus, minute: i64) -> User {
        let created = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute);
        seed_user(db, Role::Doctor, Some(status), 0, created)
    }

    fn rename(db: &Database, id: Uuid, name: &str, specialty: &str) {
        db.conn()
            .execute(
                "UPDATE users SET name = ?1, specialty = ?2 WHERE id = ?3",
                params![name, specialty, id.to_string()],
            )
            .unwrap();
    }

    #[test]
    fn queues_are_ordered_by_creation() {
        let (_dir, db) = open_temp();
        let p_old = doctor_at(&db, VerificationStatus::Pending, 1);
        let p_new = doctor_at(&db, VerificationStatus::Pending, 5);
        let v_old = doctor_at(&db, VerificationStatus::Verified, 2);
        let v_new = doctor_at(&db, VerificationStatus::Verified, 9);
        doctor_at(&db, VerificationStatus::Rejected, 3);

        let pending: Vec<_> = db.list_pending_doctors().unwrap().iter().map(|u| u.id).collect();
        assert_eq!(pending, vec![p_new.id, p_old.id]);
        let verified: Vec<_> = db.list_verified_doctors().unwrap().iter().map(|u| u.id).collect();
        assert_eq!(verified, vec![v_old.id, v_new.id]);
    }

    #[test]
    fn directory_lists_verified_by_name() {
        let (_dir, db) = open_temp();
        let b = doctor_at(&db, VerificationStatus::Verified, 1);
        let a = doctor_at(&db, VerificationStatus::Verified, 2);
        let hidden = doctor_at(&db, VerificationStatus::Pending, 3);
        let other = doctor_at(&db, VerificationStatus::Verified, 4);
        rename(&db, b.id, "Dr Bell", "Neurology");
        rename(&db, a.id, "Dr Adams", "Neurology");
        rename(&db, hidden.id, "Dr Aaron", "Neurology");
        rename(&db, other.id, "Dr Cole", "Dermatology");

        let names: Vec<_> = db
            .list_doctors_by_specialty("Neurology")
            .unwrap()
            .into_iter()
            .filter_map(|u| u.name)
            .collect();
        assert_eq!(names, vec!["Dr Adams", "Dr Bell"]);

        assert_eq!(db.get_verified_doctor(a.id).unwrap().id, a.id);
        let err = db.get_verified_doctor(hidden.id).unwrap_err();
        assert_eq!(err.core(), Some(&CoreError::DoctorUnavailable));
    }

    #[test]
    fn admin_drives_the_state_machine() {
        let (_dir, mut db) = open_temp();
        let admin = seed_user(&db, Role::Admin, None, 0, Utc::now());
        let doctor = doctor_at(&db, VerificationStatus::Pending, 0);

        let d = db.update_verification(admin.id, doctor.id, VerificationAction::Approve).unwrap();
        assert_eq!(d.verification_status, Some(VerificationStatus::Verified));

        let d = db.update_verification(admin.id, doctor.id, VerificationAction::Suspend).unwrap();
        assert_eq!(d.verification_status, Some(VerificationStatus::Pending));

        let d = db.update_verification(admin.id, doctor.id, VerificationAction::Reinstate).unwrap();
        assert_eq!(d.verification_status, Some(VerificationStatus::Verified));

        let err = db
            .update_verification(admin.id, doctor.id, VerificationAction::Reject)
            .unwrap_err();
        assert_eq!(
            err.core(),
            Some(&CoreError::InvalidTransition {
                from: VerificationStatus::Verified,
                to: VerificationStatus::Rejected,
            })
        );
    }

    #[test]
    fn rejected_is_terminal_and_non_admins_are_refused() {
        let (_dir, mut db) = open_temp();
        let admin = seed_user(&db, Role::Admin, None, 0, Utc::now());
        let p = patient(&db, 0);
        let doctor = doctor_at(&db, VerificationStatus::Pending, 0);

        let err = db.update_verification(p.id, doctor.id, VerificationAction::Approve).unwrap_err();
        assert_eq!(err.core(), Some(&CoreError::Unauthorized));

        db.update_verification(admin.id, doctor.id, VerificationAction::Reject).unwrap();
        let err = db
            .update_verification(admin.id, doctor.id, VerificationAction::Approve)
            .unwrap_err();
        assert!(matches!(err.core(), Some(CoreError::InvalidTransition { .. })));

        let err = db.update_verification(admin.id, p.id, VerificationAction::Approve).unwrap_err();
        assert_eq!(err.core(), Some(&CoreError::NotFound));

        let unchanged = db.get_user(doctor.id).unwrap();
        assert_eq!(unchanged.verification_status, Some(VerificationStatus::Rejected));
        assert_eq!(unchanged.credit, 0);
    }
}
