use std::sync::Arc;

use async_trait::async_trait;

use crate::app_error::{AppError, AppResult};
use crate::domain::entities::{identity::normalize_email, lead::Lead};

#[derive(Debug, Clone)]
pub struct NewLead {
    pub email: String,
    pub name: String,
    pub marketing_consent: bool,
    pub mission_id: Option<String>,
}

#[async_trait]
pub trait LeadRepo: Send + Sync {
    /// Upsert keyed by normalized email; re-submission updates in place.
    async fn upsert(&self, lead: &NewLead) -> AppResult<Lead>;
}

/// Captures wizard leads before (and independently of) any payment.
pub struct LeadUseCases {
    leads: Arc<dyn LeadRepo>,
}

impl LeadUseCases {
    pub fn new(leads: Arc<dyn LeadRepo>) -> Self {
        Self { leads }
    }

    pub async fn save_lead(
        &self,
        name: &str,
        email: &str,
        marketing_consent: bool,
        mission_id: Option<String>,
    ) -> AppResult<Lead> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput("Name is required".into()));
        }
        let email = normalize_email(email);
        if !email.contains('@') {
            return Err(AppError::InvalidInput("A valid email is required".into()));
        }

        self.leads
            .upsert(&NewLead {
                email,
                name: name.to_string(),
                marketing_consent,
                mission_id,
            })
            .await
    }
}
