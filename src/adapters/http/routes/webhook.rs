//! Payment provider webhook ingestion.
//!
//! Deliveries arrive at least once and in no particular order relative to
//! the user's return from checkout. Everything here leans on the ledger
//! upsert for idempotency; the handler itself holds no state.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use tracing::{debug, error, info, warn};

use crate::adapters::http::app_state::AppState;
use crate::app_error::{AppError, AppResult};
use crate::domain::entities::payment_event::{ClassifiedEvent, WebhookEnvelope, classify};
use crate::infra::webhook_signature::verify_signature;

const SIGNATURE_HEADER: &str = "x-signature";

/// Determines whether a webhook processing error should trigger a provider
/// retry.
///
/// Returns `true` if the error is transient, meaning we return 5xx so the
/// provider redelivers. Returns `false` for expected conditions that a
/// retry cannot fix; those are acknowledged with 2xx and logged.
fn is_retryable_error(error: &AppError) -> bool {
    match error {
        // Transient errors - retry may succeed
        AppError::Database(_) => true,
        AppError::Internal(_) => true,
        AppError::RateLimited => true,

        // Expected conditions - won't change with retry
        AppError::NotFound => false,
        AppError::InvalidInput(_) => false,
        AppError::InvalidCredentials => false,
        AppError::InvalidSignature => false,
    }
}

/// POST /api/billing/webhook
///
/// 200 = processed or intentionally ignored, 401 = bad signature,
/// 500 = storage failure or timeout (provider retries). Unresolvable
/// identity is never a 500: the ledger entry is kept and the resolver
/// heals it when the user shows up.
async fn handle_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<StatusCode> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;

    // Runs on the raw bytes as received; parsing first would allow a
    // re-serialization to diverge from what was signed.
    verify_signature(&app_state.config.webhook_secret, &body, signature)?;

    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            // Unknown or future payload shapes must not break ingestion of
            // known ones; acknowledge so the provider stops retrying.
            warn!(error = %e, "Malformed webhook payload, acknowledging as no-op");
            return Ok(StatusCode::OK);
        }
    };

    let event = match classify(envelope) {
        ClassifiedEvent::Entitlement(event) => event,
        ClassifiedEvent::Ignored { event_name } => {
            debug!(event_name, "Ignoring webhook event type");
            return Ok(StatusCode::OK);
        }
    };

    let apply = app_state.entitlement_use_cases.apply_event(&event);
    match tokio::time::timeout(app_state.config.webhook_apply_timeout, apply).await {
        Ok(Ok(outcome)) => {
            info!(
                event_type = %event.event_name,
                provider_reference = %event.provider_reference,
                outcome = ?outcome,
                "Webhook processed"
            );
            Ok(StatusCode::OK)
        }
        Ok(Err(e)) if is_retryable_error(&e) => {
            error!(
                error = %e,
                event_type = %event.event_name,
                provider_reference = %event.provider_reference,
                retryable = true,
                "Webhook processing failed, returning 500 for provider retry"
            );
            Ok(StatusCode::INTERNAL_SERVER_ERROR)
        }
        Ok(Err(e)) => {
            warn!(
                error = %e,
                event_type = %event.event_name,
                provider_reference = %event.provider_reference,
                retryable = false,
                "Webhook processing failed with non-retryable error, acknowledging"
            );
            Ok(StatusCode::OK)
        }
        Err(_) => {
            error!(
                event_type = %event.event_name,
                provider_reference = %event.provider_reference,
                timeout_ms = app_state.config.webhook_apply_timeout.as_millis() as u64,
                "Store writes timed out, returning 500 for provider retry"
            );
            Ok(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/webhook", post(handle_webhook))
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod tests {
    use super::*;
    use axum_test::TestServer;
    use std::sync::Arc;
    use uuid::Uuid;

    use crate::domain::entities::entitlement::EntitlementStatus;
    use crate::infra::webhook_signature::sign_payload;
    use crate::test_utils::{
        FailingEntitlementRepo, FailingPaymentLedgerRepo, TEST_WEBHOOK_SECRET, TestAppStateBuilder,
    };

    fn test_server(app_state: AppState) -> TestServer {
        TestServer::new(router().with_state(app_state)).unwrap()
    }

    fn order_created_body(reference: &str, email: &str, user_id: Option<Uuid>) -> String {
        let custom_data = match user_id {
            Some(id) => serde_json::json!({"user_id": id.to_string()}),
            None => serde_json::json!({}),
        };
        serde_json::json!({
            "meta": {"event_name": "order_created", "custom_data": custom_data},
            "data": {
                "id": reference,
                "attributes": {"status": "paid", "user_email": email}
            }
        })
        .to_string()
    }

    async fn signed_post(server: &TestServer, body: String) -> axum_test::TestResponse {
        let signature = sign_payload(TEST_WEBHOOK_SECRET, body.as_bytes());
        server
            .post("/webhook")
            .add_header(SIGNATURE_HEADER, signature)
            .text(body)
            .await
    }

    #[tokio::test]
    async fn valid_delivery_writes_ledger_and_grants_premium() {
        let (app_state, entitlements, ledger) = TestAppStateBuilder::new().build_with_mocks();
        let server = test_server(app_state);
        let user_id = Uuid::new_v4();

        let response =
            signed_post(&server, order_created_body("ord_1", "buyer@x.com", Some(user_id))).await;

        response.assert_status(StatusCode::OK);
        assert_eq!(ledger.entries().len(), 1);
        assert_eq!(ledger.entries()[0].provider_reference, "ord_1");

        let record = entitlements.find_by_user_id(user_id).expect("record");
        assert!(record.is_premium);
        assert_eq!(record.status, EntitlementStatus::Paid);
    }

    #[tokio::test]
    async fn redelivery_storm_leaves_one_ledger_entry() {
        let (app_state, _entitlements, ledger) = TestAppStateBuilder::new().build_with_mocks();
        let server = test_server(app_state);
        let body = order_created_body("sub_7", "buyer@x.com", None);

        // Five concurrent deliveries of the identical payload.
        let (r1, r2, r3, r4, r5) = tokio::join!(
            async { signed_post(&server, body.clone()).await },
            async { signed_post(&server, body.clone()).await },
            async { signed_post(&server, body.clone()).await },
            async { signed_post(&server, body.clone()).await },
            async { signed_post(&server, body.clone()).await },
        );

        for response in [r1, r2, r3, r4, r5] {
            response.assert_status(StatusCode::OK);
        }
        let entries = ledger.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].provider_reference, "sub_7");
        assert_eq!(entries[0].status, "paid");
    }

    #[tokio::test]
    async fn bad_signature_is_rejected_without_mutation() {
        let (app_state, entitlements, ledger) = TestAppStateBuilder::new().build_with_mocks();
        let server = test_server(app_state);
        let body = order_created_body("ord_1", "buyer@x.com", None);

        let response = server
            .post("/webhook")
            .add_header(SIGNATURE_HEADER, "deadbeef".repeat(8))
            .text(body)
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        assert!(ledger.entries().is_empty());
        assert!(entitlements.records().is_empty());
    }

    #[tokio::test]
    async fn missing_signature_header_is_rejected() {
        let (app_state, _entitlements, ledger) = TestAppStateBuilder::new().build_with_mocks();
        let server = test_server(app_state);

        let response = server
            .post("/webhook")
            .text(order_created_body("ord_1", "buyer@x.com", None))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        assert!(ledger.entries().is_empty());
    }

    #[tokio::test]
    async fn signature_for_different_body_is_rejected() {
        let (app_state, _entitlements, ledger) = TestAppStateBuilder::new().build_with_mocks();
        let server = test_server(app_state);

        let signature = sign_payload(
            TEST_WEBHOOK_SECRET,
            order_created_body("ord_1", "buyer@x.com", None).as_bytes(),
        );
        let response = server
            .post("/webhook")
            .add_header(SIGNATURE_HEADER, signature)
            .text(order_created_body("ord_2", "buyer@x.com", None))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        assert!(ledger.entries().is_empty());
    }

    #[tokio::test]
    async fn unknown_event_type_is_acknowledged_without_mutation() {
        let (app_state, entitlements, ledger) = TestAppStateBuilder::new().build_with_mocks();
        let server = test_server(app_state);
        let body = serde_json::json!({
            "meta": {"event_name": "affiliate_activated"},
            "data": {"id": "aff_1", "attributes": {}}
        })
        .to_string();

        let response = signed_post(&server, body).await;

        response.assert_status(StatusCode::OK);
        assert!(ledger.entries().is_empty());
        assert!(entitlements.records().is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_is_acknowledged() {
        let (app_state, _entitlements, ledger) = TestAppStateBuilder::new().build_with_mocks();
        let server = test_server(app_state);

        let response = signed_post(&server, "{\"not\": \"an envelope\"}".to_string()).await;

        response.assert_status(StatusCode::OK);
        assert!(ledger.entries().is_empty());
    }

    #[tokio::test]
    async fn identity_free_event_is_ledger_only_and_acknowledged() {
        let (app_state, entitlements, ledger) = TestAppStateBuilder::new().build_with_mocks();
        let server = test_server(app_state);
        let body = serde_json::json!({
            "meta": {"event_name": "order_created"},
            "data": {"id": "ord_9", "attributes": {"status": "paid"}}
        })
        .to_string();

        let response = signed_post(&server, body).await;

        response.assert_status(StatusCode::OK);
        assert_eq!(ledger.entries().len(), 1);
        assert!(entitlements.records().is_empty());
    }

    #[tokio::test]
    async fn cancellation_revokes_existing_grant() {
        let (app_state, entitlements, _ledger) = TestAppStateBuilder::new().build_with_mocks();
        let server = test_server(app_state);
        let user_id = Uuid::new_v4();

        signed_post(&server, order_created_body("sub_3", "buyer@x.com", Some(user_id)))
            .await
            .assert_status(StatusCode::OK);
        assert!(entitlements.find_by_user_id(user_id).unwrap().is_premium);

        let cancel_body = serde_json::json!({
            "meta": {
                "event_name": "subscription_cancelled",
                "custom_data": {"user_id": user_id.to_string()}
            },
            "data": {
                "id": "sub_3",
                "attributes": {"status": "cancelled", "user_email": "buyer@x.com"}
            }
        })
        .to_string();
        signed_post(&server, cancel_body).await.assert_status(StatusCode::OK);

        let record = entitlements.find_by_user_id(user_id).expect("record persists");
        assert!(!record.is_premium);
        assert_eq!(record.status, EntitlementStatus::Cancelled);
    }

    #[tokio::test]
    async fn ledger_failure_returns_500_for_provider_retry() {
        let (app_state, entitlements, _ledger) = TestAppStateBuilder::new()
            .with_ledger_repo(Arc::new(FailingPaymentLedgerRepo))
            .build_with_mocks();
        let server = test_server(app_state);
        let user_id = Uuid::new_v4();

        let response =
            signed_post(&server, order_created_body("ord_1", "buyer@x.com", Some(user_id))).await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        // The writes are independent: the record was still attempted.
        assert!(entitlements.find_by_user_id(user_id).is_some());
    }

    #[tokio::test]
    async fn entitlement_failure_returns_500_but_keeps_ledger_entry() {
        let (app_state, _entitlements, ledger) = TestAppStateBuilder::new()
            .with_entitlement_repo(Arc::new(FailingEntitlementRepo))
            .build_with_mocks();
        let server = test_server(app_state);

        let response = signed_post(
            &server,
            order_created_body("ord_1", "buyer@x.com", Some(Uuid::new_v4())),
        )
        .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ledger.entries().len(), 1);
    }

    #[tokio::test]
    async fn redelivery_after_storage_failure_succeeds() {
        // First delivery fails on the ledger, provider retries, the retry
        // lands cleanly. This is the recovery path the 500 exists for.
        let (failing_state, _entitlements, _ledger) = TestAppStateBuilder::new()
            .with_ledger_repo(Arc::new(FailingPaymentLedgerRepo))
            .build_with_mocks();
        let body = order_created_body("ord_1", "buyer@x.com", None);

        signed_post(&test_server(failing_state), body.clone())
            .await
            .assert_status(StatusCode::INTERNAL_SERVER_ERROR);

        let (healthy_state, _entitlements, ledger) = TestAppStateBuilder::new().build_with_mocks();
        signed_post(&test_server(healthy_state), body)
            .await
            .assert_status(StatusCode::OK);
        assert_eq!(ledger.entries().len(), 1);
    }

    #[tokio::test]
    async fn last_delivery_wins_on_ledger_redelivery() {
        let (app_state, _entitlements, ledger) = TestAppStateBuilder::new().build_with_mocks();
        let server = test_server(app_state);

        signed_post(&server, order_created_body("sub_1", "buyer@x.com", None))
            .await
            .assert_status(StatusCode::OK);

        let updated = serde_json::json!({
            "meta": {"event_name": "subscription_updated"},
            "data": {
                "id": "sub_1",
                "attributes": {"status": "past_due", "user_email": "buyer@x.com"}
            }
        })
        .to_string();
        signed_post(&server, updated).await.assert_status(StatusCode::OK);

        let entries = ledger.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, "past_due");
        assert_eq!(entries[0].event_type, "subscription_updated");
    }
}
