use chrono::NaiveDateTime;

/// A wizard lead, captured before (and independently of) any payment.
/// Keyed by normalized email; re-submission updates in place.
#[derive(Debug, Clone)]
pub struct Lead {
    pub email: String,
    pub name: String,
    pub marketing_consent: bool,
    pub mission_id: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}
