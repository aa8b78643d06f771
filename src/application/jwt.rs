use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::domain::entities::identity::Identity;
use secrecy::ExposeSecret;

/// Claims carried by the auth provider's session tokens. This service only
/// verifies and reads them; issuing belongs to the auth provider (the issue
/// helper exists for tests and tooling).
#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

impl IdentityClaims {
    pub fn identity(&self) -> AppResult<Identity> {
        let user_id = Uuid::parse_str(&self.sub).map_err(|_| AppError::InvalidCredentials)?;
        Ok(Identity::for_user(user_id, &self.email))
    }
}

pub fn issue(
    user_id: Uuid,
    email: &str,
    secret: &secrecy::SecretString,
    ttl: Duration,
) -> AppResult<String> {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let exp = now + ttl.whole_seconds();
    let claims = IdentityClaims {
        sub: user_id.to_string(),
        email: email.to_string(),
        iat: now,
        exp,
    };
    let header = Header::new(Algorithm::HS256);
    encode(
        &header,
        &claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

pub fn verify(token: &str, secret: &secrecy::SecretString) -> AppResult<IdentityClaims> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<IdentityClaims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::InvalidCredentials)
}
