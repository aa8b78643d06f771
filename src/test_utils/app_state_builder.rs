//! Test app state builder for HTTP-level integration testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use secrecy::SecretString;
use url::Url;

use crate::{
    adapters::http::app_state::AppState,
    application::use_cases::{
        checkout::CheckoutUseCases,
        entitlement::{EntitlementRepo, EntitlementUseCases, LedgerEntry, PaymentLedgerRepo},
        leads::LeadUseCases,
    },
    domain::entities::entitlement::EntitlementRecord,
    infra::{RateLimiterTrait, config::AppConfig, rate_limit::RateLimits},
    test_utils::{
        InMemoryEntitlementRepo, InMemoryLeadRepo, InMemoryPaymentLedgerRepo, InMemoryRateLimiter,
    },
};

/// Shared secret the builder configures for webhook signatures; tests sign
/// synthetic deliveries with it.
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

pub fn test_jwt_secret() -> SecretString {
    SecretString::new("test_jwt_secret".into())
}

/// Builder for creating `AppState` with in-memory mocks for testing.
///
/// # Example
///
/// ```ignore
/// let (app_state, entitlements, ledger) = TestAppStateBuilder::new()
///     .with_ledger_entry(create_test_ledger_entry(|e| {
///         e.email = Some("a@x.com".to_string());
///     }))
///     .build_with_mocks();
/// ```
#[derive(Default)]
pub struct TestAppStateBuilder {
    records: Vec<EntitlementRecord>,
    ledger_entries: Vec<LedgerEntry>,
    entitlement_repo: Option<Arc<dyn EntitlementRepo>>,
    ledger_repo: Option<Arc<dyn PaymentLedgerRepo>>,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entitlement record.
    pub fn with_record(mut self, record: EntitlementRecord) -> Self {
        self.records.push(record);
        self
    }

    /// Seed a payment ledger entry.
    pub fn with_ledger_entry(mut self, entry: LedgerEntry) -> Self {
        self.ledger_entries.push(entry);
        self
    }

    /// Replace the entitlement repo (e.g. with a failing stub).
    pub fn with_entitlement_repo(mut self, repo: Arc<dyn EntitlementRepo>) -> Self {
        self.entitlement_repo = Some(repo);
        self
    }

    /// Replace the ledger repo (e.g. with a failing stub).
    pub fn with_ledger_repo(mut self, repo: Arc<dyn PaymentLedgerRepo>) -> Self {
        self.ledger_repo = Some(repo);
        self
    }

    /// Build the AppState, discarding the mock handles.
    pub fn build(self) -> AppState {
        self.build_with_mocks().0
    }

    /// Build the AppState and return the in-memory repos for assertions.
    /// Explicit repo overrides take precedence in the wiring; the returned
    /// mocks always exist so non-overridden stores stay inspectable.
    pub fn build_with_mocks(
        self,
    ) -> (
        AppState,
        Arc<InMemoryEntitlementRepo>,
        Arc<InMemoryPaymentLedgerRepo>,
    ) {
        let entitlements = Arc::new(InMemoryEntitlementRepo::with_records(self.records));
        let ledger = Arc::new(InMemoryPaymentLedgerRepo::new());
        for entry in self.ledger_entries {
            ledger.insert(entry);
        }

        let entitlement_repo: Arc<dyn EntitlementRepo> = self
            .entitlement_repo
            .unwrap_or_else(|| entitlements.clone());
        let ledger_repo: Arc<dyn PaymentLedgerRepo> =
            self.ledger_repo.unwrap_or_else(|| ledger.clone());

        let app_state = build_app_state(entitlement_repo, ledger_repo, Arc::new(InMemoryLeadRepo::new()));
        (app_state, entitlements, ledger)
    }

    /// Build the AppState and return the in-memory lead repo for assertions.
    pub fn build_with_lead_mock(self) -> (AppState, Arc<InMemoryLeadRepo>) {
        let entitlements = Arc::new(InMemoryEntitlementRepo::with_records(self.records));
        let ledger = Arc::new(InMemoryPaymentLedgerRepo::new());
        for entry in self.ledger_entries {
            ledger.insert(entry);
        }
        let leads = Arc::new(InMemoryLeadRepo::new());

        let app_state = build_app_state(entitlements, ledger, leads.clone());
        (app_state, leads)
    }
}

fn build_app_state(
    entitlement_repo: Arc<dyn EntitlementRepo>,
    ledger_repo: Arc<dyn PaymentLedgerRepo>,
    lead_repo: Arc<InMemoryLeadRepo>,
) -> AppState {
    let config = Arc::new(AppConfig {
        jwt_secret: test_jwt_secret(),
        webhook_secret: SecretString::new(TEST_WEBHOOK_SECRET.into()),
        checkout_base_url: Url::parse("https://store.example.com/buy/abc123").unwrap(),
        cors_origin: HeaderValue::from_static("http://localhost:3000"),
        bind_addr: "127.0.0.1:3001".parse::<SocketAddr>().unwrap(),
        redis_url: String::new(),
        rate_limits: RateLimits {
            window_secs: 60,
            per_ip: 60,
            per_email: 30,
        },
        database_url: String::new(),
        trust_proxy: false,
        webhook_apply_timeout: Duration::from_secs(5),
    });

    let entitlement_use_cases = Arc::new(EntitlementUseCases::new(entitlement_repo, ledger_repo));
    let checkout_use_cases = Arc::new(CheckoutUseCases::new(config.checkout_base_url.clone()));
    let lead_use_cases = Arc::new(LeadUseCases::new(lead_repo));

    let rate_limiter: Arc<dyn RateLimiterTrait> = Arc::new(InMemoryRateLimiter::permissive());

    AppState {
        config,
        entitlement_use_cases,
        checkout_use_cases,
        lead_use_cases,
        rate_limiter,
    }
}
