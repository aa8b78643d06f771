use thiserror::Error;

/// Error taxonomy for the service. Webhook handling cares about the split
/// between retryable failures (storage) and terminal ones (bad signature,
/// malformed input); the HTTP layer maps each variant to a status and a
/// stable wire code.
#[derive(Error, Debug)]
pub enum AppError {
    /// Signature header missing, or not matching the digest of the raw body.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found")]
    NotFound,

    #[error("Too many requests")]
    RateLimited,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable code carried in error response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidSignature => "INVALID_SIGNATURE",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::NotFound => "NOT_FOUND",
            AppError::RateLimited => "RATE_LIMITED",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
