//! Health check endpoint for load balancers and monitoring.
//!
//! Returns 200 OK if the leaderboard store answers, 503 Service Unavailable
//! otherwise.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use shared::api::HealthResponse;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = state.leaderboards.healthcheck().await.is_ok();

    let response = HealthResponse {
        success: healthy,
        status: if healthy { "ok" } else { "unhealthy" }.to_string(),
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TestStateBuilder, json_body};
    use leaderboard::{MockLeaderboardService, ServiceError};

    #[tokio::test]
    async fn healthy_store_returns_ok() {
        let mut leaderboards = MockLeaderboardService::new();
        leaderboards.expect_healthcheck().returning(|| Ok(()));
        let state = TestStateBuilder::new()
            .with_leaderboard_service(leaderboards)
            .build();

        let response = health_check(State(state)).await.into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let body: HealthResponse = json_body(response).await;
        assert!(body.success);
        assert_eq!(body.status, "ok");
    }

    #[tokio::test]
    async fn unreachable_store_returns_503() {
        let mut leaderboards = MockLeaderboardService::new();
        leaderboards.expect_healthcheck().returning(|| {
            Err(ServiceError::General {
                service: "healthcheck",
                message: "connection refused".into(),
            })
        });
        let state = TestStateBuilder::new()
            .with_leaderboard_service(leaderboards)
            .build();

        let response = health_check(State(state)).await.into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: HealthResponse = json_body(response).await;
        assert_eq!(body.status, "unhealthy");
    }
}
