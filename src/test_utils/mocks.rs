//! In-memory mock implementations for the repository traits.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::{
        entitlement::{
            EntitlementRepo, EntitlementUpsert, LedgerEntry, NewLedgerEntry, PaymentLedgerRepo,
        },
        leads::{LeadRepo, NewLead},
    },
    domain::entities::{
        entitlement::EntitlementRecord, identity::normalize_email, lead::Lead,
    },
    infra::RateLimiterTrait,
};

// ============================================================================
// InMemoryEntitlementRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryEntitlementRepo {
    records: Mutex<Vec<EntitlementRecord>>,
}

impl InMemoryEntitlementRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<EntitlementRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    pub fn insert(&self, record: EntitlementRecord) {
        self.records.lock().unwrap().push(record);
    }

    pub fn records(&self) -> Vec<EntitlementRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn find_by_user_id(&self, user_id: Uuid) -> Option<EntitlementRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.user_id == Some(user_id))
            .cloned()
    }
}

#[async_trait]
impl EntitlementRepo for InMemoryEntitlementRepo {
    async fn get_by_user_id(&self, user_id: Uuid) -> AppResult<Option<EntitlementRecord>> {
        Ok(self.find_by_user_id(user_id))
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<EntitlementRecord>> {
        let email = normalize_email(email);
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.email == email)
            .cloned())
    }

    async fn upsert(&self, input: &EntitlementUpsert) -> AppResult<EntitlementRecord> {
        let mut records = self.records.lock().unwrap();
        let now = chrono::Utc::now().naive_utc();
        let email = normalize_email(&input.email);
        let is_premium = input.status.is_premium();

        // Mirrors the Postgres impl: refresh by user id, adopt a guest row
        // with the same email, or fall back to matching by email alone.
        let existing = records.iter_mut().find(|r| match input.user_id {
            Some(user_id) => {
                r.user_id == Some(user_id) || (r.user_id.is_none() && r.email == email)
            }
            None => r.email == email,
        });

        let record = match existing {
            Some(record) => {
                if record.user_id.is_none() {
                    record.user_id = input.user_id;
                }
                if !email.is_empty() {
                    record.email = email;
                }
                record.status = input.status;
                record.is_premium = is_premium;
                record.provider_reference = input.provider_reference.clone();
                record.renews_at = input.renews_at;
                record.updated_at = Some(now);
                record.clone()
            }
            None => {
                let record = EntitlementRecord {
                    id: Uuid::new_v4(),
                    user_id: input.user_id,
                    email,
                    status: input.status,
                    is_premium,
                    provider_reference: input.provider_reference.clone(),
                    renews_at: input.renews_at,
                    created_at: Some(now),
                    updated_at: Some(now),
                };
                records.push(record.clone());
                record
            }
        };

        Ok(record)
    }
}

// ============================================================================
// InMemoryPaymentLedgerRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryPaymentLedgerRepo {
    entries: Mutex<HashMap<String, LedgerEntry>>,
    email_lookups: AtomicUsize,
}

impl InMemoryPaymentLedgerRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: LedgerEntry) {
        self.entries
            .lock()
            .unwrap()
            .insert(entry.provider_reference.clone(), entry);
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.entries.lock().unwrap().values().cloned().collect()
    }

    /// How many times `list_by_email` ran; lets tests assert the resolver's
    /// fast path skipped the ledger.
    pub fn email_lookups(&self) -> usize {
        self.email_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentLedgerRepo for InMemoryPaymentLedgerRepo {
    async fn upsert(&self, entry: &NewLedgerEntry) -> AppResult<LedgerEntry> {
        let mut entries = self.entries.lock().unwrap();
        let now = chrono::Utc::now().naive_utc();

        let previous_email = entries
            .get(&entry.provider_reference)
            .and_then(|e| e.email.clone());

        let stored = LedgerEntry {
            provider_reference: entry.provider_reference.clone(),
            email: entry
                .email
                .as_deref()
                .map(normalize_email)
                .or(previous_email),
            status: entry.status.clone(),
            event_type: entry.event_type.clone(),
            received_at: Some(now),
        };
        entries.insert(entry.provider_reference.clone(), stored.clone());
        Ok(stored)
    }

    async fn list_by_email(&self, email: &str) -> AppResult<Vec<LedgerEntry>> {
        self.email_lookups.fetch_add(1, Ordering::SeqCst);
        let email = normalize_email(email);
        Ok(self
            .entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.email.as_deref() == Some(email.as_str()))
            .cloned()
            .collect())
    }
}

// ============================================================================
// InMemoryLeadRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryLeadRepo {
    leads: Mutex<HashMap<String, Lead>>,
}

impl InMemoryLeadRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leads(&self) -> Vec<Lead> {
        self.leads.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl LeadRepo for InMemoryLeadRepo {
    async fn upsert(&self, lead: &NewLead) -> AppResult<Lead> {
        let mut leads = self.leads.lock().unwrap();
        let now = chrono::Utc::now().naive_utc();
        let email = normalize_email(&lead.email);

        let stored = Lead {
            email: email.clone(),
            name: lead.name.clone(),
            marketing_consent: lead.marketing_consent,
            mission_id: lead
                .mission_id
                .clone()
                .or_else(|| leads.get(&email).and_then(|l| l.mission_id.clone())),
            created_at: leads
                .get(&email)
                .and_then(|l| l.created_at)
                .or(Some(now)),
            updated_at: Some(now),
        };
        leads.insert(email, stored.clone());
        Ok(stored)
    }
}

// ============================================================================
// Failing repos (for storage-failure paths)
// ============================================================================

pub struct FailingEntitlementRepo;

#[async_trait]
impl EntitlementRepo for FailingEntitlementRepo {
    async fn get_by_user_id(&self, _user_id: Uuid) -> AppResult<Option<EntitlementRecord>> {
        Err(AppError::Database("injected failure".into()))
    }

    async fn get_by_email(&self, _email: &str) -> AppResult<Option<EntitlementRecord>> {
        Err(AppError::Database("injected failure".into()))
    }

    async fn upsert(&self, _input: &EntitlementUpsert) -> AppResult<EntitlementRecord> {
        Err(AppError::Database("injected failure".into()))
    }
}

pub struct FailingPaymentLedgerRepo;

#[async_trait]
impl PaymentLedgerRepo for FailingPaymentLedgerRepo {
    async fn upsert(&self, _entry: &NewLedgerEntry) -> AppResult<LedgerEntry> {
        Err(AppError::Database("injected failure".into()))
    }

    async fn list_by_email(&self, _email: &str) -> AppResult<Vec<LedgerEntry>> {
        Err(AppError::Database("injected failure".into()))
    }
}

// ============================================================================
// InMemoryRateLimiter
// ============================================================================

pub struct InMemoryRateLimiter {
    allow: bool,
}

impl InMemoryRateLimiter {
    /// A limiter that always allows; tests exercise handlers, not limits.
    pub fn permissive() -> Self {
        Self { allow: true }
    }
}

#[async_trait]
impl RateLimiterTrait for InMemoryRateLimiter {
    async fn check(&self, _ip: &str, _email: Option<&str>) -> AppResult<()> {
        if self.allow {
            Ok(())
        } else {
            Err(AppError::RateLimited)
        }
    }
}
