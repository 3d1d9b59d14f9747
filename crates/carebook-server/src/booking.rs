//! Booking orchestration.
//!
//! The read-only checks run first so an obviously doomed request never
//! reaches the video service. The session is then allocated outside any
//! transaction, and the write phase re-checks everything under the database
//! write lock before moving credits and inserting the appointment. A failed
//! write phase leaves at most an unused session id behind.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use serde::Deserialize;
use uuid::Uuid;

use carebook_shared::{CoreError, Role, TimeRange};
use carebook_store::{Appointment, BookingRequest};

use crate::db::DbHandle;
use crate::error::ServerError;
use crate::video::VideoSessionProvider;

/// Pause before the first retry; doubles on each further attempt.
const RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Booking form as submitted by a patient.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookAppointment {
    pub doctor_id: Option<Uuid>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

pub struct BookingService {
    db: DbHandle,
    video: Arc<dyn VideoSessionProvider>,
    max_retries: u32,
}

impl BookingService {
    pub fn new(db: DbHandle, video: Arc<dyn VideoSessionProvider>, max_retries: u32) -> Self {
        Self {
            db,
            video,
            max_retries,
        }
    }

    /// Book an appointment for the patient identified by `subject`.
    pub async fn book(
        &self,
        subject: &str,
        form: BookAppointment,
    ) -> Result<Appointment, ServerError> {
        let subject = subject.to_owned();
        let patient = self
            .db
            .run(move |db| db.require_role(&subject, Role::Patient))
            .await?;

        let (Some(doctor_id), Some(start), Some(end)) =
            (form.doctor_id, form.start_time, form.end_time)
        else {
            return Err(
                CoreError::InvalidInput("doctor, start time and end time are required").into(),
            );
        };
        // validate the range exactly as it will be stored
        let range = TimeRange::new(start.trunc_subsecs(3), end.trunc_subsecs(3))?;
        let request = BookingRequest {
            patient_id: patient.id,
            doctor_id,
            range,
            description: form
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
        };

        let pre = request.clone();
        self.db.run(move |db| db.check_booking(&pre)).await?;

        let session_id = self.video.create_session().await.map_err(|e| {
            tracing::warn!(error = %e, doctor = %doctor_id, "video session allocation failed");
            CoreError::VideoSessionError
        })?;

        self.commit(request, session_id).await
    }

    /// Run the write phase, retrying a bounded number of times while another
    /// writer holds the lock.
    async fn commit(
        &self,
        request: BookingRequest,
        session_id: String,
    ) -> Result<Appointment, ServerError> {
        let mut attempt = 0;
        loop {
            let req = request.clone();
            let session = session_id.clone();
            match self.db.run(move |db| db.commit_booking(&req, &session)).await {
                Err(e) if e.is_busy() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::debug!(
                        attempt,
                        doctor = %request.doctor_id,
                        "booking hit lock contention, retrying"
                    );
                    tokio::time::sleep(RETRY_BACKOFF * 2u32.saturating_pow(attempt - 1)).await;
                }
                Err(e) if e.is_busy() => {
                    tracing::warn!(
                        attempts = attempt + 1,
                        doctor = %request.doctor_id,
                        "booking gave up on lock contention"
                    );
                    return Err(CoreError::SlotConflict.into());
                }
                other => return other,
            }
        }
    }
}
