use std::sync::Arc;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Path, Query, Request, State},
    http::{HeaderMap, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, FixedOffset, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use carebook_shared::slots::DaySlots;
use carebook_shared::verification::VerificationAction;
use carebook_shared::{CoreError, Role};
use carebook_store::{Appointment, Availability, CreditTransaction, DoctorProfile, User};

use crate::booking::{BookAppointment, BookingService};
use crate::config::ServerConfig;
use crate::db::DbHandle;
use crate::error::ServerError;
use crate::identity::Caller;

#[derive(Clone)]
pub struct AppState {
    pub db: DbHandle,
    pub booking: Arc<BookingService>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    fn caller(&self, headers: &HeaderMap) -> Result<Caller, ServerError> {
        Caller::from_headers(headers, &self.config)
    }

    /// Current time in the clinic's zone.
    fn clinic_now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.config.clinic_offset)
    }
}

/// JSON request body whose rejections answer like every other failure: a 400
/// with a fixed message, never the parser's detail.
struct JsonBody<T>(T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                tracing::debug!(error = %rejection, "rejected request body");
                let message = match rejection {
                    JsonRejection::JsonDataError(_) => "request body has a missing or malformed field",
                    JsonRejection::JsonSyntaxError(_) => "request body is not valid JSON",
                    JsonRejection::MissingJsonContentType(_) => "expected a JSON request body",
                    _ => "request body could not be read",
                };
                Err(CoreError::InvalidInput(message).into())
            }
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/me", post(sign_in))
        .route("/onboarding/patient", post(onboard_patient))
        .route("/onboarding/doctor", post(onboard_doctor))
        .route("/doctors", get(doctors_by_specialty))
        .route("/doctors/:id", get(doctor_profile))
        .route("/doctors/:id/slots", get(doctor_slots))
        .route("/doctor/availability", get(my_availability).put(set_availability))
        .route("/appointments", get(my_appointments).post(book_appointment))
        .route("/credits", get(my_credits))
        .route("/admin/doctors/pending", get(pending_doctors))
        .route("/admin/doctors/verified", get(verified_doctors))
        .route("/admin/doctors/:id/verification", post(update_verification))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct SignInRequest {
    email: String,
    name: Option<String>,
}

#[derive(Deserialize)]
struct SpecialtyQuery {
    specialty: Option<String>,
}

/// Public view of a verified doctor.
#[derive(Serialize)]
struct DoctorCard {
    id: Uuid,
    name: Option<String>,
    specialty: Option<String>,
    experience: Option<u32>,
    credential_url: Option<String>,
    description: Option<String>,
}

impl From<User> for DoctorCard {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            specialty: user.specialty,
            experience: user.experience,
            credential_url: user.credential_url,
            description: user.description,
        }
    }
}

#[derive(Deserialize)]
struct AvailabilityRequest {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

#[derive(Serialize)]
struct CreditsResponse {
    balance: i64,
    transactions: Vec<CreditTransaction>,
}

#[derive(Deserialize)]
struct VerificationRequest {
    action: VerificationAction,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ─── Users ───

/// First call of every session: make sure the user exists and hand out
/// the monthly credits that are due.
async fn sign_in(
    headers: HeaderMap,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SignInRequest>,
) -> Result<Json<User>, ServerError> {
    let caller = state.caller(&headers)?;
    let email = req.email.trim().to_string();
    if email.is_empty() {
        return Err(CoreError::InvalidInput("email is required").into());
    }
    let now = state.clinic_now();

    let user = state
        .db
        .run(move |db| {
            let user = db.ensure_user(&caller.subject, &email, req.name.as_deref())?;
            db.allocate_if_due(user.id, caller.plan, &now)
        })
        .await?;
    Ok(Json(user))
}

async fn onboard_patient(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<User>, ServerError> {
    let caller = state.caller(&headers)?;
    let user = state
        .db
        .run(move |db| {
            let user = db.get_user_by_external_id(&caller.subject)?;
            db.onboard_patient(user.id)
        })
        .await?;
    Ok(Json(user))
}

async fn onboard_doctor(
    headers: HeaderMap,
    State(state): State<AppState>,
    JsonBody(profile): JsonBody<DoctorProfile>,
) -> Result<Json<User>, ServerError> {
    let caller = state.caller(&headers)?;
    let user = state
        .db
        .run(move |db| {
            let user = db.get_user_by_external_id(&caller.subject)?;
            db.onboard_doctor(user.id, &profile)
        })
        .await?;
    Ok(Json(user))
}

// ─── Doctor directory ───

async fn doctors_by_specialty(
    State(state): State<AppState>,
    Query(query): Query<SpecialtyQuery>,
) -> Result<Json<Vec<DoctorCard>>, ServerError> {
    let specialty = query
        .specialty
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(CoreError::InvalidInput("specialty is required"))?;

    let doctors = state
        .db
        .run(move |db| db.list_doctors_by_specialty(&specialty))
        .await?;
    Ok(Json(doctors.into_iter().map(DoctorCard::from).collect()))
}

async fn doctor_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DoctorCard>, ServerError> {
    let doctor = state.db.run(move |db| db.get_verified_doctor(id)).await?;
    Ok(Json(doctor.into()))
}

async fn doctor_slots(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DaySlots>>, ServerError> {
    let now = state.clinic_now();
    let days = state
        .db
        .run(move |db| db.available_slots(id, &now))
        .await?;
    Ok(Json(days))
}

// ─── Doctor availability ───

async fn my_availability(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<Availability>>, ServerError> {
    let caller = state.caller(&headers)?;
    let rows = state
        .db
        .run(move |db| {
            let doctor = db.require_role(&caller.subject, Role::Doctor)?;
            db.get_availability(doctor.id)
        })
        .await?;
    Ok(Json(rows))
}

async fn set_availability(
    headers: HeaderMap,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<AvailabilityRequest>,
) -> Result<Json<Availability>, ServerError> {
    let caller = state.caller(&headers)?;
    let clinic = state.config.clinic_offset;
    let row = state
        .db
        .run(move |db| {
            let doctor = db.require_role(&caller.subject, Role::Doctor)?;
            db.set_availability(doctor.id, req.start_time, req.end_time, &clinic)
        })
        .await?;
    Ok(Json(row))
}

// ─── Appointments & credits ───

async fn my_appointments(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<Appointment>>, ServerError> {
    let caller = state.caller(&headers)?;
    let appointments = state
        .db
        .run(move |db| {
            let user = db.get_user_by_external_id(&caller.subject)?;
            match user.role {
                Role::Patient => db.appointments_for_patient(user.id),
                Role::Doctor => db.appointments_for_doctor(user.id),
                Role::Admin | Role::Unassigned => Err(CoreError::NotFound.into()),
            }
        })
        .await?;
    Ok(Json(appointments))
}

async fn book_appointment(
    headers: HeaderMap,
    State(state): State<AppState>,
    JsonBody(form): JsonBody<BookAppointment>,
) -> Result<(StatusCode, Json<Appointment>), ServerError> {
    let caller = state.caller(&headers)?;
    let appointment = state.booking.book(&caller.subject, form).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

async fn my_credits(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<CreditsResponse>, ServerError> {
    let caller = state.caller(&headers)?;
    let response = state
        .db
        .run(move |db| {
            let user = db.get_user_by_external_id(&caller.subject)?;
            Ok(CreditsResponse {
                balance: user.credit,
                transactions: db.transactions_for_user(user.id)?,
            })
        })
        .await?;
    Ok(Json(response))
}

// ─── Admin ───

async fn pending_doctors(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, ServerError> {
    let caller = state.caller(&headers)?;
    let doctors = state
        .db
        .run(move |db| {
            db.require_role(&caller.subject, Role::Admin)?;
            db.list_pending_doctors()
        })
        .await?;
    Ok(Json(doctors))
}

async fn verified_doctors(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, ServerError> {
    let caller = state.caller(&headers)?;
    let doctors = state
        .db
        .run(move |db| {
            db.require_role(&caller.subject, Role::Admin)?;
            db.list_verified_doctors()
        })
        .await?;
    Ok(Json(doctors))
}

async fn update_verification(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
    JsonBody(req): JsonBody<VerificationRequest>,
) -> Result<Json<User>, ServerError> {
    let caller = state.caller(&headers)?;
    let doctor = state
        .db
        .run(move |db| {
            let admin = db.require_role(&caller.subject, Role::Admin)?;
            db.update_verification(admin.id, doctor_id, req.action)
        })
        .await?;
    Ok(Json(doctor))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
