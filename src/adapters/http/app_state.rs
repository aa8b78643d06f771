use std::sync::Arc;

use crate::{
    application::use_cases::{
        checkout::CheckoutUseCases, entitlement::EntitlementUseCases, leads::LeadUseCases,
    },
    infra::{RateLimiterTrait, config::AppConfig},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub entitlement_use_cases: Arc<EntitlementUseCases>,
    pub checkout_use_cases: Arc<CheckoutUseCases>,
    pub lead_use_cases: Arc<LeadUseCases>,
    pub rate_limiter: Arc<dyn RateLimiterTrait>,
}
