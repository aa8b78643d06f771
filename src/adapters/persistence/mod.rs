use sqlx::PgPool;

use crate::app_error::AppError;

pub mod entitlement;
pub mod lead;
pub mod payment_ledger;

/// Postgres-backed implementation of the repository traits. One handle,
/// cloned into a trait object per store at wiring time.
#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::RowNotFound) {
            return AppError::NotFound;
        }

        // SQLSTATE class 23 is a constraint violation: the write conflicts
        // with the schema, not a storage fault worth a provider retry.
        if let sqlx::Error::Database(db_err) = &err
            && db_err.code().is_some_and(|code| code.starts_with("23"))
        {
            return AppError::InvalidInput("Conflicts with an existing record".into());
        }

        tracing::error!(error = ?err, "Database error");
        AppError::Database("Database operation failed".into())
    }
}
