//! v001 -- Initial schema creation.
//!
//! Creates the four core tables: `users`, `availabilities`, `appointments`
//! and `credit_transactions`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users (patients, doctors, admins)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id                  TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    external_id         TEXT NOT NULL UNIQUE,        -- identity provider subject
    email               TEXT NOT NULL,
    name                TEXT,
    role                TEXT NOT NULL DEFAULT 'UNASSIGNED',
    specialty           TEXT,
    experience          INTEGER,                     -- years
    credential_url      TEXT,
    description         TEXT,
    verification_status TEXT,                        -- doctors only
    credit              INTEGER NOT NULL DEFAULT 0 CHECK (credit >= 0),
    created_at          TEXT NOT NULL,               -- RFC-3339 UTC, millis
    updated_at          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_role_status
    ON users(role, verification_status, created_at);

-- ----------------------------------------------------------------
-- Appointments
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS appointments (
    id                  TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    patient_id          TEXT NOT NULL,               -- FK -> users(id)
    doctor_id           TEXT NOT NULL,               -- FK -> users(id)
    start_time          TEXT NOT NULL,
    end_time            TEXT NOT NULL,
    status              TEXT NOT NULL DEFAULT 'SCHEDULED',
    patient_description TEXT,
    video_session_id    TEXT NOT NULL,
    created_at          TEXT NOT NULL,

    CHECK (start_time < end_time),
    FOREIGN KEY (patient_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (doctor_id)  REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_appointments_doctor
    ON appointments(doctor_id, status, start_time);
CREATE INDEX IF NOT EXISTS idx_appointments_patient
    ON appointments(patient_id, start_time);

-- ----------------------------------------------------------------
-- Availability windows (time-of-day on a reference date)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS availabilities (
    id             TEXT PRIMARY KEY NOT NULL,        -- UUID v4
    doctor_id      TEXT NOT NULL,                    -- FK -> users(id)
    start_time     TEXT NOT NULL,
    end_time       TEXT NOT NULL,
    status         TEXT NOT NULL DEFAULT 'AVAILABLE',
    appointment_id TEXT UNIQUE,                      -- nullable FK -> appointments(id)
    created_at     TEXT NOT NULL,

    FOREIGN KEY (doctor_id)      REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (appointment_id) REFERENCES appointments(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_availabilities_doctor
    ON availabilities(doctor_id, status);

-- ----------------------------------------------------------------
-- Credit ledger (append-only)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS credit_transactions (
    id         TEXT PRIMARY KEY NOT NULL,            -- UUID v4
    user_id    TEXT NOT NULL,                        -- FK -> users(id)
    amount     INTEGER NOT NULL,                     -- signed
    type       TEXT NOT NULL,
    package_id TEXT,                                 -- plan id for allocations
    created_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_credit_transactions_user_ts
    ON credit_transactions(user_id, created_at DESC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
