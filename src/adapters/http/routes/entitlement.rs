//! Entitlement verification for signed-in users.
//!
//! Hit on session establish, on the explicit "verify my payment" action,
//! and by bounded client polling after checkout. Any store failure surfaces
//! as an error response, which the UI treats as "not verified yet", never
//! as a grant.

use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::get,
};
use serde::Serialize;

use super::bearer_identity;
use crate::adapters::http::app_state::AppState;
use crate::app_error::AppResult;

#[derive(Serialize)]
struct EntitlementResponse {
    is_premium: bool,
    status: Option<String>,
}

/// GET /api/billing/entitlement
async fn get_entitlement(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<EntitlementResponse>> {
    let identity = bearer_identity(&headers, &app_state.config.jwt_secret)?;

    let decision = app_state.entitlement_use_cases.resolve(&identity).await?;

    Ok(Json(EntitlementResponse {
        is_premium: decision.is_premium,
        status: decision.status.map(|s| s.as_str().to_string()),
    }))
}

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/entitlement", get(get_entitlement))
}
