//! # carebook-server
//!
//! HTTP API for the Carebook clinic.
//!
//! This binary provides:
//! - **Sign-in and onboarding** for patients and doctors, with monthly
//!   subscription credits granted on sign-in
//! - **Doctor directory and slot listings** built from each doctor's daily
//!   availability window
//! - **Appointment booking** that charges the patient, pays the doctor and
//!   allocates a video session, all or nothing
//! - **Admin verification** of doctor applications
//!
//! Identity and plan are asserted by an upstream gateway through request
//! headers.

mod api;
mod booking;
mod config;
mod db;
mod error;
mod identity;
mod video;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use carebook_shared::constants::APP_NAME;
use carebook_store::Database;

use crate::api::AppState;
use crate::booking::BookingService;
use crate::config::ServerConfig;
use crate::db::DbHandle;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,carebook_server=debug,carebook_store=info")
        }))
        .init();

    info!("Starting {} API server v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // Database (creates the file and runs migrations if needed)
    let db_path = match &config.database_path {
        Some(path) => path.clone(),
        None => Database::default_path()?,
    };
    let db = DbHandle::new(db_path, config.db_busy_timeout);
    db.migrate().await?;
    info!(path = %db.path().display(), "Database ready");

    // Video sessions for new appointments
    let video = video::from_config(&config)?;

    let booking = Arc::new(BookingService::new(
        db.clone(),
        video,
        config.booking_max_retries,
    ));

    let http_addr = config.http_addr;
    let app_state = AppState {
        db,
        booking,
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
