use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "entitlement_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntitlementStatus {
    Active,
    OnTrial,
    Paid,
    PastDue,
    Cancelled,
    Expired,
}

impl EntitlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitlementStatus::Active => "active",
            EntitlementStatus::OnTrial => "on_trial",
            EntitlementStatus::Paid => "paid",
            EntitlementStatus::PastDue => "past_due",
            EntitlementStatus::Cancelled => "cancelled",
            EntitlementStatus::Expired => "expired",
        }
    }

    /// Map a provider status string. Unknown strings yield `None` so a new
    /// provider status can never grant access by accident.
    pub fn from_provider(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Some(EntitlementStatus::Active),
            "on_trial" | "trialing" => Some(EntitlementStatus::OnTrial),
            "paid" => Some(EntitlementStatus::Paid),
            "past_due" => Some(EntitlementStatus::PastDue),
            "cancelled" | "canceled" => Some(EntitlementStatus::Cancelled),
            "expired" => Some(EntitlementStatus::Expired),
            _ => None,
        }
    }

    /// Whether this status carries premium access. `is_premium` on a record
    /// is always derived from here, never stored independently.
    pub fn is_premium(&self) -> bool {
        matches!(
            self,
            EntitlementStatus::Active | EntitlementStatus::OnTrial | EntitlementStatus::Paid
        )
    }
}

/// True when a raw provider status string would grant premium access.
/// Used for ledger entries, which keep the provider's string for audit.
pub fn is_grantable_status(raw: &str) -> bool {
    EntitlementStatus::from_provider(raw).is_some_and(|s| s.is_premium())
}

/// The read-optimized projection the UI consults. Keyed by `user_id` when
/// the payer is known to the auth system, by normalized email otherwise.
/// Never hard-deleted; revocation flips `status`/`is_premium` in place.
#[derive(Debug, Clone)]
pub struct EntitlementRecord {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub email: String,
    pub status: EntitlementStatus,
    pub is_premium: bool,
    pub provider_reference: String,
    pub renews_at: Option<NaiveDateTime>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}
