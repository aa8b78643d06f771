//! Test data factories for creating valid test fixtures.
//!
//! Each factory creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::{
    application::use_cases::entitlement::LedgerEntry,
    domain::entities::entitlement::{EntitlementRecord, EntitlementStatus},
};

pub fn test_datetime() -> NaiveDateTime {
    chrono::DateTime::from_timestamp(1_706_500_000, 0)
        .expect("valid timestamp")
        .naive_utc()
}

/// Create a test entitlement record with sensible defaults.
pub fn create_test_record(overrides: impl FnOnce(&mut EntitlementRecord)) -> EntitlementRecord {
    let mut record = EntitlementRecord {
        id: Uuid::new_v4(),
        user_id: None,
        email: "buyer@x.com".to_string(),
        status: EntitlementStatus::Paid,
        is_premium: true,
        provider_reference: "ord_test1".to_string(),
        renews_at: None,
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut record);
    record
}

/// Create a test payment ledger entry with sensible defaults.
pub fn create_test_ledger_entry(overrides: impl FnOnce(&mut LedgerEntry)) -> LedgerEntry {
    let mut entry = LedgerEntry {
        provider_reference: "ord_test1".to_string(),
        email: Some("buyer@x.com".to_string()),
        status: "paid".to_string(),
        event_type: "order_created".to_string(),
        received_at: Some(test_datetime()),
    };
    overrides(&mut entry);
    entry
}
