pub mod checkout;
pub mod entitlement;
pub mod leads;
pub mod webhook;

use axum::Router;
use axum::http::{HeaderMap, header::AUTHORIZATION};

use crate::adapters::http::app_state::AppState;
use crate::app_error::{AppError, AppResult};
use crate::application::jwt;
use crate::domain::entities::identity::Identity;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest(
            "/billing",
            Router::new()
                .merge(webhook::router())
                .merge(entitlement::router())
                .merge(checkout::router()),
        )
        .nest("/leads", leads::router())
}

/// Identity from the auth provider's bearer token.
pub(crate) fn bearer_identity(
    headers: &HeaderMap,
    secret: &secrecy::SecretString,
) -> AppResult<Identity> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::InvalidCredentials)?;

    jwt::verify(token, secret)?.identity()
}
