//! Entitlement reconciliation: webhook apply and the self-healing resolver.
//!
//! Webhook delivery and user sign-in are not ordered relative to each other.
//! The ledger (keyed by the provider's order/subscription id) is the source
//! of truth; the entitlement record is the projection the UI reads. The
//! resolver repairs the projection from the ledger on demand, which turns
//! eventual consistency into an on-demand consistent read.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app_error::AppResult;
use crate::domain::entities::{
    entitlement::{EntitlementRecord, EntitlementStatus, is_grantable_status},
    identity::{Identity, normalize_email},
    payment_event::{PaymentEvent, PaymentEventKind},
};

// ============================================================================
// Ledger Types
// ============================================================================

/// One confirmed payment event per provider reference. Redelivery updates
/// the row in place; entries are never deleted.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub provider_reference: String,
    pub email: Option<String>,
    pub status: String,
    pub event_type: String,
    pub received_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub provider_reference: String,
    pub email: Option<String>,
    pub status: String,
    pub event_type: String,
}

#[async_trait]
pub trait PaymentLedgerRepo: Send + Sync {
    /// Upsert keyed by `provider_reference`. This is the idempotency
    /// boundary for at-least-once webhook delivery.
    async fn upsert(&self, entry: &NewLedgerEntry) -> AppResult<LedgerEntry>;

    /// All entries whose normalized email matches. Case-insensitive.
    async fn list_by_email(&self, email: &str) -> AppResult<Vec<LedgerEntry>>;
}

// ============================================================================
// Entitlement Record Types
// ============================================================================

#[derive(Debug, Clone)]
pub struct EntitlementUpsert {
    pub user_id: Option<Uuid>,
    pub email: String,
    pub status: EntitlementStatus,
    pub provider_reference: String,
    pub renews_at: Option<NaiveDateTime>,
}

#[async_trait]
pub trait EntitlementRepo: Send + Sync {
    async fn get_by_user_id(&self, user_id: Uuid) -> AppResult<Option<EntitlementRecord>>;

    async fn get_by_email(&self, email: &str) -> AppResult<Option<EntitlementRecord>>;

    /// Upsert keyed by `user_id` when present, by normalized email
    /// otherwise. A guest record (no `user_id`) with the same email is
    /// adopted rather than duplicated. `is_premium` is derived from
    /// `status` at write time.
    async fn upsert(&self, input: &EntitlementUpsert) -> AppResult<EntitlementRecord>;
}

// ============================================================================
// Use Cases
// ============================================================================

/// What the resolver reports to the UI. `status` is informational; access
/// decisions use only `is_premium`.
#[derive(Debug, Clone, Serialize)]
pub struct EntitlementDecision {
    pub is_premium: bool,
    pub status: Option<EntitlementStatus>,
}

/// Outcome of applying a webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Ledger and entitlement record both written.
    Applied,
    /// Ledger written; no identity could be resolved. Expected for guest
    /// checkouts that predate the account; the resolver heals this later.
    LedgerOnly,
    /// Ledger written; the status string is not one we map, so the record
    /// was left untouched.
    StatusUnmapped,
}

pub struct EntitlementUseCases {
    entitlements: Arc<dyn EntitlementRepo>,
    ledger: Arc<dyn PaymentLedgerRepo>,
}

impl EntitlementUseCases {
    pub fn new(entitlements: Arc<dyn EntitlementRepo>, ledger: Arc<dyn PaymentLedgerRepo>) -> Self {
        Self {
            entitlements,
            ledger,
        }
    }

    /// Apply a verified, classified webhook event.
    ///
    /// The ledger upsert happens unconditionally, before and independently
    /// of identity resolution: an event we cannot attribute today is still
    /// the proof of payment the resolver needs tomorrow. The two store
    /// writes fail independently and are logged distinctly so operators can
    /// replay from the ledger.
    pub async fn apply_event(&self, event: &PaymentEvent) -> AppResult<ApplyOutcome> {
        let entry = NewLedgerEntry {
            provider_reference: event.provider_reference.clone(),
            email: event.email.clone(),
            status: event.effective_status(),
            event_type: event.event_name.clone(),
        };

        let ledger_result = self.ledger.upsert(&entry).await;
        if let Err(e) = &ledger_result {
            error!(
                error = %e,
                provider_reference = %event.provider_reference,
                event_type = %event.event_name,
                "Payment ledger upsert failed"
            );
        }

        let record_result = self.apply_to_record(event).await;
        if let Err(e) = &record_result {
            error!(
                error = %e,
                provider_reference = %event.provider_reference,
                event_type = %event.event_name,
                "Entitlement record upsert failed"
            );
        }

        ledger_result?;
        record_result
    }

    async fn apply_to_record(&self, event: &PaymentEvent) -> AppResult<ApplyOutcome> {
        let Some(status) = self.record_status_for(event) else {
            warn!(
                provider_reference = %event.provider_reference,
                status = %event.effective_status(),
                "Unmapped provider status, leaving entitlement record untouched"
            );
            return Ok(ApplyOutcome::StatusUnmapped);
        };

        let user_id = event.custom_user_id.as_deref().and_then(|raw| {
            let parsed = Uuid::parse_str(raw).ok();
            if parsed.is_none() {
                debug!(
                    user_id = raw,
                    provider_reference = %event.provider_reference,
                    "Malformed user_id in webhook custom data, falling back to email"
                );
            }
            parsed
        });

        let email = match (&event.email, user_id) {
            (Some(email), _) => email.clone(),
            // user_id alone is enough to key the record; the email column
            // stays empty until a later event or self-heal fills it.
            (None, Some(_)) => String::new(),
            (None, None) => {
                info!(
                    provider_reference = %event.provider_reference,
                    event_type = %event.event_name,
                    "No identity on payment event, ledger entry only"
                );
                return Ok(ApplyOutcome::LedgerOnly);
            }
        };

        self.entitlements
            .upsert(&EntitlementUpsert {
                user_id,
                email,
                status,
                provider_reference: event.provider_reference.clone(),
                renews_at: event.renews_at,
            })
            .await?;

        info!(
            provider_reference = %event.provider_reference,
            event_type = %event.event_name,
            status = status.as_str(),
            is_premium = status.is_premium(),
            "Entitlement record updated from webhook"
        );
        Ok(ApplyOutcome::Applied)
    }

    fn record_status_for(&self, event: &PaymentEvent) -> Option<EntitlementStatus> {
        let mapped = EntitlementStatus::from_provider(&event.effective_status());
        if event.kind.is_revocation() {
            // A cancellation event revokes even when its status string is
            // unfamiliar; it must never be silently ignored.
            return Some(mapped.unwrap_or(match event.kind {
                PaymentEventKind::SubscriptionExpired => EntitlementStatus::Expired,
                _ => EntitlementStatus::Cancelled,
            }));
        }
        mapped
    }

    /// Resolve current entitlement for an identity. Idempotent; safe to
    /// poll. Errors propagate so callers fail closed ("unknown" is treated
    /// as "not entitled"), never open.
    pub async fn resolve(&self, identity: &Identity) -> AppResult<EntitlementDecision> {
        // Fast path: the projection.
        let record = match identity.user_id {
            Some(user_id) => self.entitlements.get_by_user_id(user_id).await?,
            None => self.entitlements.get_by_email(&identity.email).await?,
        };

        if let Some(record) = &record {
            if record.is_premium {
                return Ok(EntitlementDecision {
                    is_premium: true,
                    status: Some(record.status),
                });
            }
        }

        // Slow path: the ledger, by normalized email. A grantable entry
        // here means a webhook landed before the projection could be keyed
        // to this identity. Repair it now.
        let email = normalize_email(&identity.email);
        let entries = self.ledger.list_by_email(&email).await?;
        let grantable = entries
            .iter()
            .filter(|e| is_grantable_status(&e.status))
            .max_by_key(|e| e.received_at);

        if let Some(entry) = grantable {
            let status =
                EntitlementStatus::from_provider(&entry.status).unwrap_or(EntitlementStatus::Paid);
            let healed = self
                .entitlements
                .upsert(&EntitlementUpsert {
                    user_id: identity.user_id,
                    email,
                    status,
                    provider_reference: entry.provider_reference.clone(),
                    renews_at: None,
                })
                .await?;

            info!(
                provider_reference = %entry.provider_reference,
                "Entitlement self-healed from payment ledger"
            );
            return Ok(EntitlementDecision {
                is_premium: true,
                status: Some(healed.status),
            });
        }

        // Not paid yet. A normal state, not an error.
        Ok(EntitlementDecision {
            is_premium: false,
            status: record.map(|r| r.status),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        InMemoryEntitlementRepo, InMemoryPaymentLedgerRepo, create_test_ledger_entry,
        create_test_record,
    };

    fn use_cases() -> (
        EntitlementUseCases,
        Arc<InMemoryEntitlementRepo>,
        Arc<InMemoryPaymentLedgerRepo>,
    ) {
        let entitlements = Arc::new(InMemoryEntitlementRepo::new());
        let ledger = Arc::new(InMemoryPaymentLedgerRepo::new());
        let use_cases = EntitlementUseCases::new(entitlements.clone(), ledger.clone());
        (use_cases, entitlements, ledger)
    }

    fn paid_order_event(reference: &str, email: Option<&str>, user_id: Option<Uuid>) -> PaymentEvent {
        PaymentEvent {
            kind: PaymentEventKind::OrderCreated,
            event_name: "order_created".to_string(),
            provider_reference: reference.to_string(),
            custom_user_id: user_id.map(|u| u.to_string()),
            email: email.map(normalize_email),
            status: Some("paid".to_string()),
            renews_at: None,
        }
    }

    #[tokio::test]
    async fn apply_event_writes_ledger_and_record() {
        let (use_cases, entitlements, ledger) = use_cases();
        let user_id = Uuid::new_v4();

        let outcome = use_cases
            .apply_event(&paid_order_event("ord_1", Some("a@x.com"), Some(user_id)))
            .await
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(ledger.entries().len(), 1);
        let record = entitlements
            .get_by_user_id(user_id)
            .await
            .unwrap()
            .expect("record created");
        assert!(record.is_premium);
        assert_eq!(record.status, EntitlementStatus::Paid);
        assert_eq!(record.provider_reference, "ord_1");
    }

    #[tokio::test]
    async fn apply_event_redelivery_does_not_duplicate_ledger() {
        let (use_cases, _entitlements, ledger) = use_cases();
        let event = paid_order_event("ord_1", Some("a@x.com"), None);

        for _ in 0..5 {
            use_cases.apply_event(&event).await.unwrap();
        }

        assert_eq!(ledger.entries().len(), 1);
        assert_eq!(ledger.entries()[0].provider_reference, "ord_1");
    }

    #[tokio::test]
    async fn apply_event_without_identity_is_ledger_only() {
        let (use_cases, entitlements, ledger) = use_cases();

        let outcome = use_cases
            .apply_event(&paid_order_event("ord_2", None, None))
            .await
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::LedgerOnly);
        assert_eq!(ledger.entries().len(), 1);
        assert!(entitlements.records().is_empty());
    }

    #[tokio::test]
    async fn apply_event_unmapped_status_keeps_record_untouched() {
        let (use_cases, entitlements, ledger) = use_cases();
        let mut event = paid_order_event("ord_3", Some("a@x.com"), None);
        event.status = Some("refund_pending".to_string());

        let outcome = use_cases.apply_event(&event).await.unwrap();

        assert_eq!(outcome, ApplyOutcome::StatusUnmapped);
        // The ledger still records the raw status for audit.
        assert_eq!(ledger.entries()[0].status, "refund_pending");
        assert!(entitlements.records().is_empty());
    }

    #[tokio::test]
    async fn cancellation_revokes_premium() {
        let (use_cases, entitlements, _ledger) = use_cases();
        let user_id = Uuid::new_v4();

        use_cases
            .apply_event(&paid_order_event("sub_7", Some("a@x.com"), Some(user_id)))
            .await
            .unwrap();

        let cancel = PaymentEvent {
            kind: PaymentEventKind::SubscriptionCancelled,
            event_name: "subscription_cancelled".to_string(),
            provider_reference: "sub_7".to_string(),
            custom_user_id: Some(user_id.to_string()),
            email: Some("a@x.com".to_string()),
            status: Some("cancelled".to_string()),
            renews_at: None,
        };
        use_cases.apply_event(&cancel).await.unwrap();

        let record = entitlements
            .get_by_user_id(user_id)
            .await
            .unwrap()
            .expect("record persists after revocation");
        assert!(!record.is_premium);
        assert_eq!(record.status, EntitlementStatus::Cancelled);
    }

    #[tokio::test]
    async fn cancellation_with_unknown_status_still_revokes() {
        let (use_cases, entitlements, _ledger) = use_cases();
        let user_id = Uuid::new_v4();

        use_cases
            .apply_event(&paid_order_event("sub_8", Some("a@x.com"), Some(user_id)))
            .await
            .unwrap();

        let cancel = PaymentEvent {
            kind: PaymentEventKind::SubscriptionExpired,
            event_name: "subscription_expired".to_string(),
            provider_reference: "sub_8".to_string(),
            custom_user_id: Some(user_id.to_string()),
            email: None,
            status: Some("some_new_terminal_state".to_string()),
            renews_at: None,
        };
        use_cases.apply_event(&cancel).await.unwrap();

        let record = entitlements.get_by_user_id(user_id).await.unwrap().unwrap();
        assert!(!record.is_premium);
        assert_eq!(record.status, EntitlementStatus::Expired);
    }

    #[tokio::test]
    async fn resolve_fast_path_short_circuits() {
        let (use_cases, entitlements, ledger) = use_cases();
        let user_id = Uuid::new_v4();
        entitlements.insert(create_test_record(|r| {
            r.user_id = Some(user_id);
            r.email = "a@x.com".to_string();
            r.status = EntitlementStatus::Active;
            r.is_premium = true;
        }));

        let decision = use_cases
            .resolve(&Identity::for_user(user_id, "a@x.com"))
            .await
            .unwrap();

        assert!(decision.is_premium);
        assert_eq!(decision.status, Some(EntitlementStatus::Active));
        // The ledger was never consulted.
        assert_eq!(ledger.email_lookups(), 0);
    }

    #[tokio::test]
    async fn resolve_self_heals_from_ledger() {
        let (use_cases, entitlements, ledger) = use_cases();
        let user_id = Uuid::new_v4();
        ledger.insert(create_test_ledger_entry(|e| {
            e.provider_reference = "ord_1".to_string();
            e.email = Some("new@user.com".to_string());
            e.status = "paid".to_string();
        }));

        let identity = Identity::for_user(user_id, "new@user.com");
        let decision = use_cases.resolve(&identity).await.unwrap();

        assert!(decision.is_premium);
        let record = entitlements
            .get_by_user_id(user_id)
            .await
            .unwrap()
            .expect("self-heal left a record behind");
        assert!(record.is_premium);
        assert_eq!(record.provider_reference, "ord_1");

        // A second call takes the fast path.
        let lookups_before = ledger.email_lookups();
        let again = use_cases.resolve(&identity).await.unwrap();
        assert!(again.is_premium);
        assert_eq!(ledger.email_lookups(), lookups_before);
    }

    #[tokio::test]
    async fn resolve_matches_email_case_insensitively() {
        let (use_cases, _entitlements, ledger) = use_cases();
        ledger.insert(create_test_ledger_entry(|e| {
            e.email = Some("a@x.com".to_string());
            e.status = "active".to_string();
        }));

        for email in ["A@X.com", "a@x.com", " a@x.com "] {
            let decision = use_cases
                .resolve(&Identity::for_user(Uuid::new_v4(), email))
                .await
                .unwrap();
            assert!(decision.is_premium, "lookup by {:?} should match", email);
        }
    }

    #[tokio::test]
    async fn resolve_negative_is_not_an_error() {
        let (use_cases, _entitlements, _ledger) = use_cases();

        let decision = use_cases
            .resolve(&Identity::for_user(Uuid::new_v4(), "nobody@x.com"))
            .await
            .unwrap();

        assert!(!decision.is_premium);
        assert!(decision.status.is_none());
    }

    #[tokio::test]
    async fn resolve_ignores_non_grantable_ledger_entries() {
        let (use_cases, entitlements, ledger) = use_cases();
        ledger.insert(create_test_ledger_entry(|e| {
            e.email = Some("a@x.com".to_string());
            e.status = "cancelled".to_string();
        }));

        let decision = use_cases
            .resolve(&Identity::for_user(Uuid::new_v4(), "a@x.com"))
            .await
            .unwrap();

        assert!(!decision.is_premium);
        assert!(entitlements.records().is_empty());
    }

    #[tokio::test]
    async fn resolve_guest_identity_heals_by_email() {
        let (use_cases, entitlements, ledger) = use_cases();
        ledger.insert(create_test_ledger_entry(|e| {
            e.email = Some("guest@x.com".to_string());
            e.status = "paid".to_string();
        }));

        let decision = use_cases
            .resolve(&Identity::for_email("Guest@X.com"))
            .await
            .unwrap();

        assert!(decision.is_premium);
        let record = entitlements
            .get_by_email("guest@x.com")
            .await
            .unwrap()
            .expect("guest record created");
        assert!(record.user_id.is_none());
    }

    #[tokio::test]
    async fn status_derived_boolean_holds_after_every_mutation_path() {
        let (use_cases, entitlements, ledger) = use_cases();
        let user_id = Uuid::new_v4();

        // Webhook apply path.
        use_cases
            .apply_event(&paid_order_event("ord_9", Some("b@x.com"), Some(user_id)))
            .await
            .unwrap();
        for record in entitlements.records() {
            assert_eq!(record.is_premium, record.status.is_premium());
        }

        // Self-heal path.
        ledger.insert(create_test_ledger_entry(|e| {
            e.provider_reference = "ord_10".to_string();
            e.email = Some("c@x.com".to_string());
            e.status = "on_trial".to_string();
        }));
        use_cases
            .resolve(&Identity::for_user(Uuid::new_v4(), "c@x.com"))
            .await
            .unwrap();
        for record in entitlements.records() {
            assert_eq!(record.is_premium, record.status.is_premium());
        }
    }
}
