//! Subscription plan tiers and the monthly credits each one grants.
//!
//! The active plan is supplied by an external billing provider; this module
//! only knows the identifiers it uses and the allocation table.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    FreeUser,
    Standard,
    Premium,
}

impl Plan {
    /// Plan identifier as used by the billing provider and stored in
    /// `credit_transactions.package_id`.
    pub fn id(&self) -> &'static str {
        match self {
            Plan::FreeUser => "free_user",
            Plan::Standard => "standard",
            Plan::Premium => "premium",
        }
    }

    /// Credits granted once per calendar month while the plan is active.
    pub fn monthly_credits(&self) -> i64 {
        match self {
            Plan::FreeUser => 0,
            Plan::Standard => 10,
            Plan::Premium => 24,
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim() {
            "free_user" => Some(Plan::FreeUser),
            "standard" => Some(Plan::Standard),
            "premium" => Some(Plan::Premium),
            _ => None,
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}
