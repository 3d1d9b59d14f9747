/// Application name
pub const APP_NAME: &str = "Carebook";

/// Credits moved from patient to doctor for one consultation
pub const APPOINTMENT_CREDIT_COST: i64 = 2;

/// Length of a bookable slot in minutes
pub const SLOT_DURATION_MINUTES: i64 = 30;

/// Number of calendar days (starting today) covered by slot listings
pub const BOOKING_HORIZON_DAYS: u64 = 4;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Onboarding bounds for doctor profiles
pub const MIN_EXPERIENCE_YEARS: u32 = 1;
pub const MAX_EXPERIENCE_YEARS: u32 = 15;
pub const MIN_DESCRIPTION_LEN: usize = 20;
pub const MAX_DESCRIPTION_LEN: usize = 1000;

/// Label formats used in slot listings (chrono strftime syntax)
pub const SLOT_TIME_FORMAT: &str = "%-I:%M %p";
pub const DAY_LABEL_FORMAT: &str = "%A, %B %-d";
pub const DAY_KEY_FORMAT: &str = "%Y-%m-%d";
