use serde::{Deserialize, Serialize};

/// Generates `as_str`, `parse` and `Display` for a fieldless enum whose
/// persisted form is a fixed uppercase string.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
    Unassigned,
}

string_enum!(Role {
    Patient => "PATIENT",
    Doctor => "DOCTOR",
    Admin => "ADMIN",
    Unassigned => "UNASSIGNED",
});

impl Role {
    /// Only patients receive monthly plan credits.
    pub fn receives_plan_credits(&self) -> bool {
        matches!(self, Role::Patient)
    }

    /// Whether a role has already been chosen.
    pub fn is_onboarded(&self) -> bool {
        !matches!(self, Role::Unassigned)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
}

string_enum!(VerificationStatus {
    Pending => "PENDING",
    Verified => "VERIFIED",
    Rejected => "REJECTED",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

string_enum!(AppointmentStatus {
    Scheduled => "SCHEDULED",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailabilityStatus {
    Available,
}

string_enum!(AvailabilityStatus {
    Available => "AVAILABLE",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    CreditPurchase,
    AppointmentDeduction,
}

string_enum!(TransactionType {
    CreditPurchase => "CREDIT_PURCHASE",
    AppointmentDeduction => "APPOINTMENT_DEDUCTION",
});
