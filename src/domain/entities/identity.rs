use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical form for email correlation keys: trimmed and lower-cased.
/// Applied at every boundary that reads or writes an email.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// A caller identity as the entitlement layer sees it.
///
/// `user_id` is the stable identifier issued by the auth provider and is the
/// preferred correlation key. The email is the fallback for payments made
/// before an account existed (guest checkout). Construction normalizes the
/// email so lookups never depend on the caller remembering to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Option<Uuid>,
    pub email: String,
}

impl Identity {
    pub fn new(user_id: Option<Uuid>, email: &str) -> Self {
        Self {
            user_id,
            email: normalize_email(email),
        }
    }

    pub fn for_user(user_id: Uuid, email: &str) -> Self {
        Self::new(Some(user_id), email)
    }

    pub fn for_email(email: &str) -> Self {
        Self::new(None, email)
    }
}
