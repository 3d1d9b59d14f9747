//! # carebook-store
//!
//! SQLite persistence for the Carebook scheduling engine.
//!
//! The crate exposes a synchronous [`Database`] handle wrapping a
//! `rusqlite::Connection` with typed helpers for every domain model, the
//! credit ledger, and the booking write transaction. Each request handler is
//! expected to open its own handle; all coordination between concurrent
//! handlers happens through SQLite's write lock (`BEGIN IMMEDIATE`).

pub mod appointments;
pub mod availability;
pub mod booking;
pub mod database;
pub mod doctors;
pub mod ledger;
pub mod migrations;
pub mod models;
pub mod users;

mod codec;
mod error;

pub use booking::BookingRequest;
pub use database::Database;
pub use error::StoreError;
pub use models::*;
