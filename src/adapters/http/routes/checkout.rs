//! Checkout redirect URL construction.

use axum::{Json, Router, extract::State, http::HeaderMap, routing::post};
use serde::{Deserialize, Serialize};

use super::bearer_identity;
use crate::adapters::http::app_state::AppState;
use crate::app_error::{AppError, AppResult};
use crate::domain::entities::identity::Identity;

#[derive(Deserialize)]
struct CreateCheckoutPayload {
    /// Required for guests; ignored when a valid session token is present.
    email: Option<String>,
}

#[derive(Serialize)]
struct CheckoutResponse {
    checkout_url: String,
}

/// POST /api/billing/checkout
///
/// Signed-in users get their user id embedded as custom data so the webhook
/// can resolve identity directly; guests get an email-only URL and rely on
/// the resolver's ledger fallback after they sign up.
async fn create_checkout(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateCheckoutPayload>,
) -> AppResult<Json<CheckoutResponse>> {
    let identity = match bearer_identity(&headers, &app_state.config.jwt_secret) {
        Ok(identity) => identity,
        Err(_) => {
            let email = payload
                .email
                .ok_or_else(|| AppError::InvalidInput("Email is required for checkout".into()))?;
            if !email.contains('@') {
                return Err(AppError::InvalidInput("A valid email is required".into()));
            }
            Identity::for_email(&email)
        }
    };

    let checkout_url = app_state.checkout_use_cases.build_checkout_url(&identity);

    Ok(Json(CheckoutResponse {
        checkout_url: checkout_url.to_string(),
    }))
}

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/checkout", post(create_checkout))
}
