use async_trait::async_trait;
use sqlx::Row;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::leads::{LeadRepo, NewLead},
    domain::entities::lead::Lead,
};

fn row_to_lead(row: &sqlx::postgres::PgRow) -> Lead {
    Lead {
        email: row.get("email"),
        name: row.get("name"),
        marketing_consent: row.get("marketing_consent"),
        mission_id: row.get("mission_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl LeadRepo for PostgresPersistence {
    async fn upsert(&self, lead: &NewLead) -> AppResult<Lead> {
        let row = sqlx::query(
            r#"
            INSERT INTO leads (email, name, marketing_consent, mission_id)
            VALUES (LOWER(TRIM($1)), $2, $3, $4)
            ON CONFLICT (email) DO UPDATE SET
                name = EXCLUDED.name,
                marketing_consent = EXCLUDED.marketing_consent,
                mission_id = COALESCE(EXCLUDED.mission_id, leads.mission_id),
                updated_at = CURRENT_TIMESTAMP
            RETURNING email, name, marketing_consent, mission_id, created_at, updated_at
            "#,
        )
        .bind(&lead.email)
        .bind(&lead.name)
        .bind(lead.marketing_consent)
        .bind(&lead.mission_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_lead(&row))
    }
}
