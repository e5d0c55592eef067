use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    handler_count: usize,
    api_base_url: String,
}

impl HealthState {
    pub fn new(handler_count: usize, api_base_url: String) -> Self {
        Self { handler_count, api_base_url }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub slack: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let slack = slack_check(&state);
    let ready = slack.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "greetbot-server runtime initialized".to_string(),
        },
        slack,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn slack_check(state: &HealthState) -> HealthCheck {
    if state.handler_count == 0 {
        return HealthCheck {
            status: "degraded",
            detail: "no slack listeners are registered".to_string(),
        };
    }
    HealthCheck {
        status: "ready",
        detail: format!("{} listeners registered, web api at {}", state.handler_count, state.api_base_url),
    }
}
