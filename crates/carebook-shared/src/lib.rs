//! # carebook-shared
//!
//! Domain vocabulary shared by the store and the server: roles and statuses,
//! subscription plans, the error taxonomy, time intervals, the slot generator
//! and the doctor verification state machine.
//!
//! Nothing in this crate touches I/O.

pub mod constants;
pub mod error;
pub mod interval;
pub mod plan;
pub mod slots;
pub mod types;
pub mod verification;

pub use error::CoreError;
pub use interval::TimeRange;
pub use plan::Plan;
pub use types::{AppointmentStatus, AvailabilityStatus, Role, TransactionType, VerificationStatus};
