//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

use carebook_shared::constants::DEFAULT_HTTP_PORT;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `carebook.db` in the platform data directory.
    pub database_path: Option<PathBuf>,

    /// Offset of the clinic's local time from UTC. Availability windows are
    /// projected onto calendar days, and monthly credits roll over, in this
    /// zone.
    /// Env: `CLINIC_UTC_OFFSET_MINUTES`
    /// Default: `0`
    pub clinic_offset: FixedOffset,

    /// Header carrying the authenticated subject id.
    /// Env: `IDENTITY_HEADER`
    /// Default: `x-authenticated-subject`
    pub identity_header: String,

    /// Header carrying the caller's subscription plan.
    /// Env: `PLAN_HEADER`
    /// Default: `x-subscription-plan`
    pub plan_header: String,

    /// Endpoint that creates video sessions. Unset means sessions are minted
    /// locally.
    /// Env: `VIDEO_API_URL`
    pub video_api_url: Option<String>,

    /// Bearer key sent to the video endpoint.
    /// Env: `VIDEO_API_KEY`
    pub video_api_key: Option<String>,

    /// Retries of the booking write phase on lock contention.
    /// Env: `BOOKING_MAX_RETRIES`
    /// Default: `3`
    pub booking_max_retries: u32,

    /// How long a connection waits for another writer's lock.
    /// Env: `DB_BUSY_TIMEOUT_MS`
    /// Default: `5000`
    pub db_busy_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: None,
            clinic_offset: Utc.fix(),
            identity_header: "x-authenticated-subject".to_string(),
            plan_header: "x-subscription-plan".to_string(),
            video_api_url: None,
            video_api_key: None,
            booking_max_retries: 3,
            db_busy_timeout: Duration::from_millis(5000),
        }
    }
}

// The API key stays out of logs.
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("clinic_offset", &self.clinic_offset)
            .field("identity_header", &self.identity_header)
            .field("plan_header", &self.plan_header)
            .field("video_api_url", &self.video_api_url)
            .field("video_api_key", &self.video_api_key.as_ref().map(|_| "<redacted>"))
            .field("booking_max_retries", &self.booking_max_retries)
            .field("db_busy_timeout", &self.db_busy_timeout)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup. Invalid values are
    /// logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            if !path.is_empty() {
                config.database_path = Some(PathBuf::from(path));
            }
        }

        if let Some(val) = lookup("CLINIC_UTC_OFFSET_MINUTES") {
            match val.trim().parse::<i32>().ok().and_then(offset_from_minutes) {
                Some(offset) => config.clinic_offset = offset,
                None => {
                    tracing::warn!(value = %val, "Invalid CLINIC_UTC_OFFSET_MINUTES, using UTC")
                }
            }
        }

        if let Some(name) = lookup("IDENTITY_HEADER") {
            if !name.trim().is_empty() {
                config.identity_header = name.trim().to_ascii_lowercase();
            }
        }

        if let Some(name) = lookup("PLAN_HEADER") {
            if !name.trim().is_empty() {
                config.plan_header = name.trim().to_ascii_lowercase();
            }
        }

        if let Some(url) = lookup("VIDEO_API_URL") {
            if !url.is_empty() {
                config.video_api_url = Some(url);
            }
        }

        if let Some(key) = lookup("VIDEO_API_KEY") {
            if !key.is_empty() {
                config.video_api_key = Some(key);
            }
        }

        if let Some(val) = lookup("BOOKING_MAX_RETRIES") {
            match val.parse::<u32>() {
                Ok(n) => config.booking_max_retries = n,
                Err(_) => tracing::warn!(value = %val, "Invalid BOOKING_MAX_RETRIES, using default"),
            }
        }

        if let Some(val) = lookup("DB_BUSY_TIMEOUT_MS") {
            match val.parse::<u64>() {
                Ok(ms) => config.db_busy_timeout = Duration::from_millis(ms),
                Err(_) => tracing::warn!(value = %val, "Invalid DB_BUSY_TIMEOUT_MS, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(minutes.checked_mul(60)?)
}
