use async_trait::async_trait;
use sqlx::Row;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::entitlement::{LedgerEntry, NewLedgerEntry, PaymentLedgerRepo},
};

fn row_to_entry(row: &sqlx::postgres::PgRow) -> LedgerEntry {
    LedgerEntry {
        provider_reference: row.get("provider_reference"),
        email: row.get("email"),
        status: row.get("status"),
        event_type: row.get("event_type"),
        received_at: row.get("received_at"),
    }
}

const SELECT_COLS: &str = "provider_reference, email, status, event_type, received_at";

#[async_trait]
impl PaymentLedgerRepo for PostgresPersistence {
    async fn upsert(&self, entry: &NewLedgerEntry) -> AppResult<LedgerEntry> {
        // The provider redelivers webhooks at least once; the conflict
        // target on provider_reference is what makes redelivery harmless.
        // A redelivery without an email must not erase one we already know.
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO payment_events
                (provider_reference, email, status, event_type, received_at)
            VALUES ($1, LOWER(TRIM($2)), $3, $4, CURRENT_TIMESTAMP)
            ON CONFLICT (provider_reference) DO UPDATE SET
                email = COALESCE(EXCLUDED.email, payment_events.email),
                status = EXCLUDED.status,
                event_type = EXCLUDED.event_type,
                received_at = CURRENT_TIMESTAMP
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(&entry.provider_reference)
        .bind(&entry.email)
        .bind(&entry.status)
        .bind(&entry.event_type)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_entry(&row))
    }

    async fn list_by_email(&self, email: &str) -> AppResult<Vec<LedgerEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payment_events WHERE email = LOWER(TRIM($1)) ORDER BY received_at DESC",
            SELECT_COLS
        ))
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_entry).collect())
    }
}
