use crate::{
    adapters::http::app_state::AppState,
    application::use_cases::{
        checkout::CheckoutUseCases,
        entitlement::{EntitlementRepo, EntitlementUseCases, PaymentLedgerRepo},
        leads::{LeadRepo, LeadUseCases},
    },
    infra::{
        config::AppConfig,
        postgres_persistence,
        rate_limit::{RateLimiterTrait, RedisRateLimiter},
    },
};
use std::fs::File;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();

    let postgres = Arc::new(postgres_persistence(&config.database_url).await?);
    let rate_limiter: Arc<dyn RateLimiterTrait> =
        Arc::new(RedisRateLimiter::connect(&config.redis_url, config.rate_limits).await?);

    let entitlement_repo = postgres.clone() as Arc<dyn EntitlementRepo>;
    let ledger_repo = postgres.clone() as Arc<dyn PaymentLedgerRepo>;
    let lead_repo = postgres as Arc<dyn LeadRepo>;

    Ok(AppState {
        entitlement_use_cases: Arc::new(EntitlementUseCases::new(entitlement_repo, ledger_repo)),
        checkout_use_cases: Arc::new(CheckoutUseCases::new(config.checkout_base_url.clone())),
        lead_use_cases: Arc::new(LeadUseCases::new(lead_repo)),
        rate_limiter,
        config: Arc::new(config),
    })
}

/// Console logs for humans, a JSON file for shipping. Webhook outcomes land
/// in both with event_type / provider_reference / retryable fields so
/// operators can reconcile against the payment ledger.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cosmiccv_api=debug,tower_http=info".into());

    let console_layer = fmt::layer().with_target(false).pretty();

    let file = File::create("cosmiccv-api.log").expect("cannot create log file");
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
