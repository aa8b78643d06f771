//! Wizard lead capture.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::{Deserialize, Serialize};

use crate::adapters::http::app_state::AppState;
use crate::app_error::AppResult;

#[derive(Deserialize)]
struct SaveLeadPayload {
    name: String,
    email: String,
    #[serde(default)]
    marketing_consent: bool,
    #[serde(default)]
    mission_id: Option<String>,
}

#[derive(Serialize)]
struct LeadResponse {
    email: String,
}

/// POST /api/leads
async fn save_lead(
    State(app_state): State<AppState>,
    Json(payload): Json<SaveLeadPayload>,
) -> AppResult<(StatusCode, Json<LeadResponse>)> {
    let lead = app_state
        .lead_use_cases
        .save_lead(
            &payload.name,
            &payload.email,
            payload.marketing_consent,
            payload.mission_id,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(LeadResponse { email: lead.email })))
}

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", post(save_lead))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_test::TestServer;

    use crate::test_utils::TestAppStateBuilder;

    fn test_server(app_state: AppState) -> TestServer {
        TestServer::new(router().with_state(app_state)).unwrap()
    }

    #[tokio::test]
    async fn save_lead_returns_normalized_email() {
        let (app_state, leads) = TestAppStateBuilder::new().build_with_lead_mock();
        let server = test_server(app_state);

        let response = server
            .post("/")
            .json(&serde_json::json!({
                "name": "Ada",
                "email": " Ada@Example.COM",
                "marketing_consent": true,
                "mission_id": "orbit"
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: serde_json::Value = response.json();
        assert_eq!(body["email"], "ada@example.com");
        assert_eq!(leads.leads().len(), 1);
    }

    #[tokio::test]
    async fn invalid_lead_is_rejected() {
        let app_state = TestAppStateBuilder::new().build();
        let server = test_server(app_state);

        let response = server
            .post("/")
            .json(&serde_json::json!({"name": "", "email": "a@x.com"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }
}
