use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use carebook_shared::CoreError;
use carebook_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Storage error: {0}")]
    Store(StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Core(core) => ServerError::Core(core),
            StoreError::NotFound => ServerError::Core(CoreError::NotFound),
            other => ServerError::Store(other),
        }
    }
}

impl ServerError {
    /// SQLite lock contention that outlived the busy timeout.
    pub fn is_busy(&self) -> bool {
        matches!(self, ServerError::Store(e) if e.is_busy())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Core(core) => match core {
                CoreError::Unauthorized => StatusCode::UNAUTHORIZED,
                CoreError::NotFound
                | CoreError::DoctorUnavailable
                | CoreError::NoAvailabilityConfigured => StatusCode::NOT_FOUND,
                CoreError::InvalidInput(_) | CoreError::InvalidTransition { .. } => {
                    StatusCode::BAD_REQUEST
                }
                CoreError::SlotConflict => StatusCode::CONFLICT,
                CoreError::InsufficientCredit => StatusCode::PAYMENT_REQUIRED,
                CoreError::VideoSessionError => StatusCode::BAD_GATEWAY,
                CoreError::LedgerTransferFailed => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::Store(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ServerError::Core(core) => core.to_string(),
            ServerError::Store(_) | ServerError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                "Internal server error".to_string()
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
