use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::entitlement::{EntitlementRepo, EntitlementUpsert},
    domain::entities::entitlement::EntitlementRecord,
};

fn row_to_record(row: &sqlx::postgres::PgRow) -> EntitlementRecord {
    EntitlementRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        email: row.get("email"),
        status: row.get("status"),
        is_premium: row.get("is_premium"),
        provider_reference: row.get("provider_reference"),
        renews_at: row.get("renews_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, user_id, email, status, is_premium, provider_reference, renews_at,
    created_at, updated_at
"#;

#[async_trait]
impl EntitlementRepo for PostgresPersistence {
    async fn get_by_user_id(&self, user_id: Uuid) -> AppResult<Option<EntitlementRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM entitlements WHERE user_id = $1",
            SELECT_COLS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<EntitlementRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM entitlements WHERE email = LOWER(TRIM($1)) ORDER BY updated_at DESC LIMIT 1",
            SELECT_COLS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn upsert(&self, input: &EntitlementUpsert) -> AppResult<EntitlementRecord> {
        let is_premium = input.status.is_premium();
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let record = match input.user_id {
            Some(user_id) => {
                // Refresh an existing user-keyed record. An empty email on
                // the input (user-id-only webhook) keeps the stored one.
                let updated = sqlx::query(&format!(
                    r#"
                    UPDATE entitlements SET
                        email = COALESCE(NULLIF(LOWER(TRIM($2)), ''), email),
                        status = $3,
                        is_premium = $4,
                        provider_reference = $5,
                        renews_at = $6,
                        updated_at = CURRENT_TIMESTAMP
                    WHERE user_id = $1
                    RETURNING {}
                    "#,
                    SELECT_COLS
                ))
                .bind(user_id)
                .bind(&input.email)
                .bind(input.status)
                .bind(is_premium)
                .bind(&input.provider_reference)
                .bind(input.renews_at)
                .fetch_optional(&mut *tx)
                .await
                .map_err(AppError::from)?;

                match updated {
                    Some(row) => row,
                    None => {
                        // Adopt a guest record created before the account
                        // existed (paid by email, signed up later).
                        let adopted = sqlx::query(&format!(
                            r#"
                            UPDATE entitlements SET
                                user_id = $1,
                                status = $3,
                                is_premium = $4,
                                provider_reference = $5,
                                renews_at = $6,
                                updated_at = CURRENT_TIMESTAMP
                            WHERE user_id IS NULL AND email = LOWER(TRIM($2))
                            RETURNING {}
                            "#,
                            SELECT_COLS
                        ))
                        .bind(user_id)
                        .bind(&input.email)
                        .bind(input.status)
                        .bind(is_premium)
                        .bind(&input.provider_reference)
                        .bind(input.renews_at)
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(AppError::from)?;

                        match adopted {
                            Some(row) => row,
                            None => {
                                insert_record(&mut tx, Some(user_id), input, is_premium).await?
                            }
                        }
                    }
                }
            }
            None => {
                // Email is the whole identity here; it updates whichever
                // record holds that email, guest or user-keyed.
                let updated = sqlx::query(&format!(
                    r#"
                    UPDATE entitlements SET
                        status = $2,
                        is_premium = $3,
                        provider_reference = $4,
                        renews_at = $5,
                        updated_at = CURRENT_TIMESTAMP
                    WHERE email = LOWER(TRIM($1))
                    RETURNING {}
                    "#,
                    SELECT_COLS
                ))
                .bind(&input.email)
                .bind(input.status)
                .bind(is_premium)
                .bind(&input.provider_reference)
                .bind(input.renews_at)
                .fetch_optional(&mut *tx)
                .await
                .map_err(AppError::from)?;

                match updated {
                    Some(row) => row,
                    None => insert_record(&mut tx, None, input, is_premium).await?,
                }
            }
        };

        tx.commit().await.map_err(AppError::from)?;
        Ok(row_to_record(&record))
    }
}

async fn insert_record(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Option<Uuid>,
    input: &EntitlementUpsert,
    is_premium: bool,
) -> Result<sqlx::postgres::PgRow, AppError> {
    sqlx::query(&format!(
        r#"
        INSERT INTO entitlements
            (id, user_id, email, status, is_premium, provider_reference, renews_at)
        VALUES ($1, $2, LOWER(TRIM($3)), $4, $5, $6, $7)
        RETURNING {}
        "#,
        SELECT_COLS
    ))
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(&input.email)
    .bind(input.status)
    .bind(is_premium)
    .bind(&input.provider_reference)
    .bind(input.renews_at)
    .fetch_one(&mut **tx)
    .await
    .map_err(AppError::from)
}
