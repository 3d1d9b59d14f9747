//! Appointment queries and the insert used by the booking transaction.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use carebook_shared::{AppointmentStatus, TimeRange};

use crate::codec::{not_found, parse_enum, parse_ts, parse_uuid, ts};
use crate::database::Database;
use crate::error::Result;
use crate::models::Appointment;

const APPOINTMENT_COLUMNS: &str = "id, patient_id, doctor_id, start_time, end_time, status,
     patient_description, video_session_id, created_at";

impl Database {
    pub fn get_appointment(&self, id: Uuid) -> Result<Appointment> {
        self.conn()
            .query_row(
                &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
                params![id.to_string()],
                row_to_appointment,
            )
            .map_err(not_found)
    }

    /// Scheduled appointments booked by a patient, earliest first.
    pub fn appointments_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>> {
        self.scheduled_where("patient_id = ?1", &patient_id.to_string())
    }

    /// Scheduled appointments with a doctor, earliest first.
    pub fn appointments_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>> {
        self.scheduled_where("doctor_id = ?1", &doctor_id.to_string())
    }

    /// Scheduled appointments of a doctor that have not ended by `after`.
    pub(crate) fn upcoming_for_doctor(
        &self,
        doctor_id: Uuid,
        after: DateTime<Utc>,
    ) -> Result<Vec<Appointment>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {APPOINTMENT_COLUMNS}
             FROM appointments
             WHERE doctor_id = ?1 AND status = ?2 AND end_time > ?3
             ORDER BY start_time ASC"
        ))?;
        let rows = stmt.query_map(
            params![
                doctor_id.to_string(),
                AppointmentStatus::Scheduled.as_str(),
                ts(&after)
            ],
            row_to_appointment,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn scheduled_where(&self, clause: &str, id: &str) -> Result<Vec<Appointment>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {APPOINTMENT_COLUMNS}
             FROM appointments
             WHERE {clause} AND status = ?2
             ORDER BY start_time ASC"
        ))?;
        let rows = stmt.query_map(
            params![id, AppointmentStatus::Scheduled.as_str()],
            row_to_appointment,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

/// First scheduled appointment of `doctor_id` sharing an instant with
/// `range`. Touching intervals do not collide.
pub(crate) fn find_overlapping(
    conn: &Connection,
    doctor_id: Uuid,
    range: &TimeRange,
) -> Result<Option<Appointment>> {
    let found = conn
        .query_row(
            &format!(
                "SELECT {APPOINTMENT_COLUMNS}
                 FROM appointments
                 WHERE doctor_id = ?1 AND status = ?2
                   AND start_time < ?4 AND end_time > ?3
                 ORDER BY start_time ASC
                 LIMIT 1"
            ),
            params![
                doctor_id.to_string(),
                AppointmentStatus::Scheduled.as_str(),
                ts(&range.start()),
                ts(&range.end()),
            ],
            row_to_appointment,
        )
        .optional()?;
    Ok(found)
}

pub(crate) fn insert_appointment(conn: &Connection, appointment: &Appointment) -> Result<()> {
    conn.execute(
        "INSERT INTO appointments (id, patient_id, doctor_id, start_time, end_time, status,
                                   patient_description, video_session_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            appointment.id.to_string(),
            appointment.patient_id.to_string(),
            appointment.doctor_id.to_string(),
            ts(&appointment.start_time),
            ts(&appointment.end_time),
            appointment.status.as_str(),
            appointment.patient_description,
            appointment.video_session_id,
            ts(&appointment.created_at),
        ],
    )?;
    Ok(())
}

fn row_to_appointment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Appointment> {
    let id: String = row.get(0)?;
    let patient_id: String = row.get(1)?;
    let doctor_id: String = row.get(2)?;
    let start: String = row.get(3)?;
    let end: String = row.get(4)?;
    let status: String = row.get(5)?;
    let created: String = row.get(8)?;

    Ok(Appointment {
        id: parse_uuid(0, &id)?,
        patient_id: parse_uuid(1, &patient_id)?,
        doctor_id: parse_uuid(2, &doctor_id)?,
        start_time: parse_ts(3, &start)?,
        end_time: parse_ts(4, &end)?,
        status: parse_enum(5, &status, AppointmentStatus::parse)?,
        patient_description: row.get(6)?,
        video_session_id: row.get(7)?,
        created_at: parse_ts(8, &created)?,
    })
}
