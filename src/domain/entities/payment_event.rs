//! Payment provider webhook payloads and their classification.

use chrono::NaiveDateTime;
use serde::Deserialize;

use super::identity::normalize_email;

/// The provider's webhook envelope: an event name plus a resource with
/// attributes. Unknown attribute shapes deserialize to defaults so future
/// event variants cannot break ingestion of known ones.
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    pub meta: WebhookMeta,
    pub data: WebhookResource,
}

#[derive(Debug, Deserialize)]
pub struct WebhookMeta {
    pub event_name: String,
    #[serde(default)]
    pub custom_data: Option<WebhookCustomData>,
}

/// Custom data echoed back from the checkout redirect. `user_id` stays a
/// string here; identity resolution parses it and logs malformed values.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookCustomData {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookResource {
    pub id: String,
    #[serde(default)]
    pub attributes: WebhookAttributes,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookAttributes {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub renews_at: Option<String>,
    #[serde(default)]
    pub ends_at: Option<String>,
}

/// Event kinds that drive entitlement state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEventKind {
    OrderCreated,
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionPaymentSuccess,
    SubscriptionCancelled,
    SubscriptionExpired,
}

impl PaymentEventKind {
    fn from_event_name(name: &str) -> Option<Self> {
        match name {
            "order_created" => Some(PaymentEventKind::OrderCreated),
            "subscription_created" => Some(PaymentEventKind::SubscriptionCreated),
            "subscription_updated" => Some(PaymentEventKind::SubscriptionUpdated),
            "subscription_payment_success" => Some(PaymentEventKind::SubscriptionPaymentSuccess),
            "subscription_cancelled" => Some(PaymentEventKind::SubscriptionCancelled),
            "subscription_expired" => Some(PaymentEventKind::SubscriptionExpired),
            _ => None,
        }
    }

    /// Cancellation and expiry revoke; everything else applies the status
    /// the provider reports.
    pub fn is_revocation(&self) -> bool {
        matches!(
            self,
            PaymentEventKind::SubscriptionCancelled | PaymentEventKind::SubscriptionExpired
        )
    }
}

/// A normalized payment event extracted from a verified envelope.
#[derive(Debug)]
pub struct PaymentEvent {
    pub kind: PaymentEventKind,
    pub event_name: String,
    /// Order or subscription id, the ledger's idempotency key.
    pub provider_reference: String,
    /// Raw `user_id` from the checkout custom data, if present.
    pub custom_user_id: Option<String>,
    pub email: Option<String>,
    pub status: Option<String>,
    pub renews_at: Option<NaiveDateTime>,
}

impl PaymentEvent {
    /// Status string recorded in the ledger. Revocation events without a
    /// status fall back to the status their kind implies.
    pub fn effective_status(&self) -> String {
        if let Some(status) = &self.status {
            return status.clone();
        }
        match self.kind {
            PaymentEventKind::SubscriptionCancelled => "cancelled".to_string(),
            PaymentEventKind::SubscriptionExpired => "expired".to_string(),
            _ => "unknown".to_string(),
        }
    }
}

/// Result of classifying a verified payload. Event names outside the
/// allow-list land in `Ignored` and are acknowledged without side effects.
#[derive(Debug)]
pub enum ClassifiedEvent {
    Entitlement(PaymentEvent),
    Ignored { event_name: String },
}

pub fn classify(envelope: WebhookEnvelope) -> ClassifiedEvent {
    let Some(kind) = PaymentEventKind::from_event_name(&envelope.meta.event_name) else {
        return ClassifiedEvent::Ignored {
            event_name: envelope.meta.event_name,
        };
    };

    let attributes = envelope.data.attributes;
    let renews_at = attributes
        .renews_at
        .as_deref()
        .or(attributes.ends_at.as_deref())
        .and_then(parse_provider_timestamp);

    ClassifiedEvent::Entitlement(PaymentEvent {
        kind,
        event_name: envelope.meta.event_name,
        provider_reference: envelope.data.id,
        custom_user_id: envelope.meta.custom_data.and_then(|c| c.user_id),
        email: attributes.user_email.as_deref().map(normalize_email),
        status: attributes
            .status
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty()),
        renews_at,
    })
}

fn parse_provider_timestamp(raw: &str) -> Option<NaiveDateTime> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.naive_utc())
}
