//! The booking write phase.
//!
//! Booking is split in two: [`Database::check_booking`] runs the cheap
//! read-only checks before any external call is made, and
//! [`Database::commit_booking`] repeats them inside a single `BEGIN
//! IMMEDIATE` transaction together with the ledger transfer and the
//! appointment insert. Only the second pass is authoritative.

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use carebook_shared::constants::APPOINTMENT_CREDIT_COST;
use carebook_shared::{AppointmentStatus, CoreError, Role, TimeRange};

use crate::appointments::{find_overlapping, insert_appointment};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::ledger::transfer_in;
use crate::models::{Appointment, User};
use crate::users::user_by_id;

/// A validated request to book `range` with a doctor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub range: TimeRange,
    pub description: Option<String>,
}

impl Database {
    /// Reject a booking that cannot succeed, without taking the write lock.
    pub fn check_booking(&self, request: &BookingRequest) -> Result<()> {
        preconditions(self.conn(), request).map(|_| ())
    }

    /// Debit the patient, credit the doctor and insert the appointment, all
    /// or nothing.
    ///
    /// `video_session_id` must already be allocated; it is only stored.
    /// A storage failure while moving credits is reported as
    /// [`CoreError::LedgerTransferFailed`]; one while inserting the
    /// appointment propagates unchanged.
    pub fn commit_booking(
        &mut self,
        request: &BookingRequest,
        video_session_id: &str,
    ) -> Result<Appointment> {
        let tx = self.write_tx()?;
        preconditions(&tx, request)?;

        let now = Utc::now();
        transfer_in(
            &tx,
            request.patient_id,
            request.doctor_id,
            APPOINTMENT_CREDIT_COST,
            now,
        )
        .map_err(|e| match e {
            StoreError::Core(_) => e,
            e if e.is_busy() => e,
            e => {
                tracing::error!(error = %e, "ledger transfer failed during booking");
                CoreError::LedgerTransferFailed.into()
            }
        })?;

        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            start_time: request.range.start(),
            end_time: request.range.end(),
            status: AppointmentStatus::Scheduled,
            patient_description: request.description.clone(),
            video_session_id: video_session_id.to_owned(),
            created_at: now,
        };
        insert_appointment(&tx, &appointment)?;
        tx.commit()?;

        tracing::info!(
            appointment = %appointment.id,
            patient = %request.patient_id,
            doctor = %request.doctor_id,
            start = %appointment.start_time,
            "appointment booked"
        );
        self.get_appointment(appointment.id)
    }
}

/// Patient, doctor, credit and conflict checks, in that order.
fn preconditions(conn: &Connection, request: &BookingRequest) -> Result<User> {
    let patient = match user_by_id(conn, request.patient_id) {
        Ok(user) if user.role == Role::Patient => user,
        Ok(_) | Err(StoreError::NotFound) => return Err(CoreError::NotFound.into()),
        Err(e) => return Err(e),
    };

    match user_by_id(conn, request.doctor_id) {
        Ok(doctor) if doctor.is_bookable_doctor() => {}
        Ok(_) | Err(StoreError::NotFound) => return Err(CoreError::DoctorUnavailable.into()),
        Err(e) => return Err(e),
    }

    if patient.credit < APPOINTMENT_CREDIT_COST {
        return Err(CoreError::InsufficientCredit.into());
    }

    if let Some(existing) = find_overlapping(conn, request.doctor_id, &request.range)? {
        tracing::debug!(doctor = %request.doctor_id, existing = %existing.id, "slot already taken");
        return Err(CoreError::SlotConflict.into());
    }

    Ok(patient)
}
