//! Doctor availability windows and slot listings.
//!
//! A doctor owns at most one *unconsumed* availability row. Publishing a new
//! window discards every row that no appointment has claimed and inserts the
//! replacement; rows linked to an appointment are never touched.

use std::fmt;

use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use carebook_shared::slots::{generate_slots, DailyWindow, DaySlots};
use carebook_shared::{AvailabilityStatus, CoreError, Role, TimeRange};

use crate::codec::{parse_enum, parse_ts, parse_uuid, ts};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Availability;
use crate::users::user_by_id;

const AVAILABILITY_COLUMNS: &str =
    "id, doctor_id, start_time, end_time, status, appointment_id, created_at";

impl Database {
    /// Replace the doctor's recurring window.
    ///
    /// `start_time` / `end_time` carry the time-of-day on an arbitrary
    /// reference date. Read in `tz`, both ends must fall on the same
    /// calendar day with the start first.
    pub fn set_availability<Tz: TimeZone>(
        &mut self,
        doctor_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        tz: &Tz,
    ) -> Result<Availability> {
        let start_time = start_time.trunc_subsecs(3);
        let end_time = end_time.trunc_subsecs(3);
        let (local_start, local_end) = (start_time.with_timezone(tz), end_time.with_timezone(tz));
        if local_start.date_naive() != local_end.date_naive() {
            return Err(
                CoreError::InvalidInput("availability must start and end on the same day").into(),
            );
        }
        DailyWindow::new(local_start.time(), local_end.time())?;

        let tx = self.write_tx()?;
        match user_by_id(&tx, doctor_id) {
            Ok(user) if user.role == Role::Doctor => {}
            Ok(_) | Err(StoreError::NotFound) => return Err(CoreError::NotFound.into()),
            Err(e) => return Err(e),
        }

        let discarded = tx.execute(
            "DELETE FROM availabilities WHERE doctor_id = ?1 AND appointment_id IS NULL",
            params![doctor_id.to_string()],
        )?;

        let availability = Availability {
            id: Uuid::new_v4(),
            doctor_id,
            start_time,
            end_time,
            status: AvailabilityStatus::Available,
            appointment_id: None,
            created_at: Utc::now(),
        };
        tx.execute(
            "INSERT INTO availabilities (id, doctor_id, start_time, end_time, status, appointment_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6)",
            params![
                availability.id.to_string(),
                doctor_id.to_string(),
                ts(&availability.start_time),
                ts(&availability.end_time),
                availability.status.as_str(),
                ts(&availability.created_at),
            ],
        )?;
        tx.commit()?;

        tracing::info!(doctor = %doctor_id, discarded, "availability updated");
        Ok(availability)
    }

    /// All availability rows of a doctor, ordered by start time.
    pub fn get_availability(&self, doctor_id: Uuid) -> Result<Vec<Availability>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {AVAILABILITY_COLUMNS}
             FROM availabilities
             WHERE doctor_id = ?1
             ORDER BY start_time ASC"
        ))?;
        let rows = stmt.query_map(params![doctor_id.to_string()], row_to_availability)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Bookable slots of a verified doctor for the next few days.
    ///
    /// `now` fixes both the cut-off for past slots and the time zone in
    /// which the daily window is projected and labelled.
    pub fn available_slots<Tz>(&self, doctor_id: Uuid, now: &DateTime<Tz>) -> Result<Vec<DaySlots>>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        match user_by_id(self.conn(), doctor_id) {
            Ok(doctor) if doctor.is_bookable_doctor() => {}
            Ok(_) | Err(StoreError::NotFound) => return Err(CoreError::DoctorUnavailable.into()),
            Err(e) => return Err(e),
        }

        let window = current_window(self.conn(), doctor_id)?.map(|a| {
            DailyWindow::from_timestamps(a.start_time, a.end_time, &now.timezone())
        });

        let booked = self
            .upcoming_for_doctor(doctor_id, now.with_timezone(&Utc))?
            .into_iter()
            .map(|a| TimeRange::new(a.start_time, a.end_time))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let days = generate_slots(window.as_ref(), &booked, now)?;

        tracing::debug!(
            doctor = %doctor_id,
            slots = days.iter().map(|d| d.slots.len()).sum::<usize>(),
            "generated slots"
        );
        Ok(days)
    }
}

/// The doctor's current `AVAILABLE` window, newest first.
fn current_window(conn: &Connection, doctor_id: Uuid) -> Result<Option<Availability>> {
    let found = conn
        .query_row(
            &format!(
                "SELECT {AVAILABILITY_COLUMNS}
                 FROM availabilities
                 WHERE doctor_id = ?1 AND status = ?2
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1"
            ),
            params![doctor_id.to_string(), AvailabilityStatus::Available.as_str()],
            row_to_availability,
        )
        .optional()?;
    Ok(found)
}

fn row_to_availability(row: &rusqlite::Row<'_>) -> rusqlite::Result<Availability> {
    let id: String = row.get(0)?;
    let doctor_id: String = row.get(1)?;
    let start: String = row.get(2)?;
    let end: String = row.get(3)?;
    let status: String = row.get(4)?;
    let appointment_id: Option<String> = row.get(5)?;
    let created: String = row.get(6)?;

    Ok(Availability {
        id: parse_uuid(0, &id)?,
        doctor_id: parse_uuid(1, &doctor_id)?,
        start_time: parse_ts(2, &start)?,
        end_time: parse_ts(3, &end)?,
        status: parse_enum(4, &status, AvailabilityStatus::parse)?,
        appointment_id: appointment_id.map(|s| parse_uuid(5, &s)).transpose()?,
        created_at: parse_ts(6, &created)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::testing::{open_temp, patient, seed_user, verified_doctor};
    use carebook_shared::VerificationStatus;
    use chrono::Duration;

    /// Time-of-day on the 1970-01-01 reference date.
    fn tod(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(1970, 1, 1, h, m, 0).unwrap()
    }

    fn day(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, 3, h, m, 0).unwrap()
    }

    #[test]
    fn rewrite_keeps_only_linked_rows() {
        let (_dir, mut db) = open_temp();
        let doctor = verified_doctor(&db);
        let p = patient(&db, 0);

        let first = db.set_availability(doctor.id, tod(9, 0), tod(12, 0), &Utc).unwrap();

        // claim the first row with an appointment
        let appointment_id = Uuid::new_v4();
        db.conn()
            .execute(
                "INSERT INTO appointments (id, patient_id, doctor_id, start_time, end_time, status,
                                           video_session_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'SCHEDULED', 's', ?6)",
                params![
                    appointment_id.to_string(),
                    p.id.to_string(),
                    doctor.id.to_string(),
                    ts(&day(9, 0)),
                    ts(&day(9, 30)),
                    ts(&Utc::now()),
                ],
            )
            .unwrap();
        db.conn()
            .execute(
                "UPDATE availabilities SET appointment_id = ?1 WHERE id = ?2",
                params![appointment_id.to_string(), first.id.to_string()],
            )
            .unwrap();

        let second = db.set_availability(doctor.id, tod(13, 0), tod(15, 0), &Utc).unwrap();
        let third = db.set_availability(doctor.id, tod(8, 0), tod(10, 0), &Utc).unwrap();

        let rows = db.get_availability(doctor.id).unwrap();
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        assert_eq!(rows.len(), 2);
        assert!(ids.contains(&first.id));
        assert!(ids.contains(&third.id));
        assert!(!ids.contains(&second.id));
        // ordered by start time
        assert_eq!(rows[0].id, third.id);
    }

    #[test]
    fn set_availability_validates_input() {
        let (_dir, mut db) = open_temp();
        let doctor = verified_doctor(&db);
        let p = patient(&db, 0);

        let err = db.set_availability(doctor.id, tod(12, 0), tod(9, 0), &Utc).unwrap_err();
        assert!(matches!(err.core(), Some(CoreError::InvalidInput(_))));

        let err = db.set_availability(p.id, tod(9, 0), tod(12, 0), &Utc).unwrap_err();
        assert_eq!(err.core(), Some(&CoreError::NotFound));
    }

    #[test]
    fn window_must_stay_within_one_day() {
        let (_dir, mut db) = open_temp();
        let doctor = verified_doctor(&db);
        let next_day = |h: u32| tod(h, 0) + Duration::days(1);

        // 23:00 to 01:00 wraps midnight
        let err = db
            .set_availability(doctor.id, tod(23, 0), next_day(1), &Utc)
            .unwrap_err();
        assert!(matches!(err.core(), Some(CoreError::InvalidInput(_))));

        // a full 24 hours reads back as an empty window
        let err = db
            .set_availability(doctor.id, tod(9, 0), next_day(9), &Utc)
            .unwrap_err();
        assert!(matches!(err.core(), Some(CoreError::InvalidInput(_))));
        assert!(db.get_availability(doctor.id).unwrap().is_empty());

        // the day boundary is the clinic's, not UTC's
        let clinic = chrono::FixedOffset::west_opt(5 * 3600).unwrap();
        let row = db
            .set_availability(doctor.id, tod(22, 0), next_day(1), &clinic)
            .unwrap();
        let window = DailyWindow::from_timestamps(row.start_time, row.end_time, &clinic);
        assert_eq!(window.start, chrono::NaiveTime::from_hms_opt(17, 0, 0).unwrap());
        assert_eq!(window.end, chrono::NaiveTime::from_hms_opt(20, 0, 0).unwrap());
        // 02:00 to 06:00 UTC spans local midnight
        let err = db
            .set_availability(doctor.id, tod(2, 0), tod(6, 0), &clinic)
            .unwrap_err();
        assert!(matches!(err.core(), Some(CoreError::InvalidInput(_))));
    }

    #[test]
    fn slots_use_latest_window_and_skip_bookings() {
        let (_dir, mut db) = open_temp();
        let doctor = verified_doctor(&db);
        let p = patient(&db, 0);
        db.set_availability(doctor.id, tod(13, 0), tod(14, 0), &Utc).unwrap();
        db.set_availability(doctor.id, tod(9, 0), tod(12, 0), &Utc).unwrap();

        crate::appointments::insert_appointment(
            db.conn(),
            &crate::models::Appointment {
                id: Uuid::new_v4(),
                patient_id: p.id,
                doctor_id: doctor.id,
                start_time: day(10, 0),
                end_time: day(10, 30),
                status: carebook_shared::AppointmentStatus::Scheduled,
                patient_description: None,
                video_session_id: "s".into(),
                created_at: Utc::now(),
            },
        )
        .unwrap();

        let days = db.available_slots(doctor.id, &day(8, 0)).unwrap();
        assert_eq!(days.len(), 4);
        let starts: Vec<_> = days[0].slots.iter().map(|s| s.start_time).collect();
        assert_eq!(
            starts,
            vec![day(9, 0), day(9, 30), day(10, 30), day(11, 0), day(11, 30)]
        );
        assert_eq!(days[1].slots[0].start_time, day(9, 0) + Duration::days(1));
    }

    #[test]
    fn slots_require_verified_doctor_and_window() {
        let (_dir, mut db) = open_temp();
        let doctor = verified_doctor(&db);
        let err = db.available_slots(doctor.id, &day(8, 0)).unwrap_err();
        assert_eq!(err.core(), Some(&CoreError::NoAvailabilityConfigured));

        let pending = seed_user(
            &db,
            Role::Doctor,
            Some(VerificationStatus::Pending),
            0,
            Utc::now(),
        );
        db.set_availability(pending.id, tod(9, 0), tod(12, 0), &Utc).unwrap();
        let err = db.available_slots(pending.id, &day(8, 0)).unwrap_err();
        assert_eq!(err.core(), Some(&CoreError::DoctorUnavailable));

        let err = db.available_slots(Uuid::new_v4(), &day(8, 0)).unwrap_err();
        assert_eq!(err.core(), Some(&CoreError::DoctorUnavailable));
    }
}
