//! One member across several leaderboards.
//!
//! Endpoints:
//! - PUT /m/{member}/scores - Set the member's score in every listed leaderboard
//! - GET /m/{member}/scores?leaderboardIds=a,b - The member's standing in each
//!
//! Leaderboards are visited in request order and the first failure aborts
//! the request. Writes already applied to earlier leaderboards stay.

use axum::{
    Json, Router, debug_handler,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::put,
};
use garde::Validate;
use shared::api::{
    LeaderboardScorePayload, MultiRankQuery, MultiScorePayload, MultiScoresResponse, WriteQuery,
};

use super::{member_payload, parse_order};
use crate::{error::AppError, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/{member}/scores",
        put(set_member_scores).get(get_member_scores),
    )
}

#[debug_handler]
async fn set_member_scores(
    State(state): State<AppState>,
    Path(member): Path<String>,
    Query(query): Query<WriteQuery>,
    Json(payload): Json<MultiScorePayload>,
) -> Result<impl IntoResponse, AppError> {
    query
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let score_ttl = query.score_ttl.as_deref().unwrap_or_default();
    let mut scores = Vec::with_capacity(payload.leaderboards.len());
    for leaderboard in payload.leaderboards {
        let written = state
            .leaderboards
            .set_member_score(&leaderboard, &member, payload.score, query.prev_rank, score_ttl)
            .await?;

        scores.push(LeaderboardScorePayload {
            leaderboard_id: leaderboard,
            member: member_payload(written),
        });
    }

    tracing::debug!(member = %member, count = scores.len(), "scores written");

    Ok(Json(MultiScoresResponse {
        success: true,
        scores,
    }))
}

/// Fails with 404 as soon as one leaderboard does not hold the member.
#[debug_handler]
async fn get_member_scores(
    State(state): State<AppState>,
    Path(member): Path<String>,
    Query(query): Query<MultiRankQuery>,
) -> Result<impl IntoResponse, AppError> {
    let order = parse_order(query.order.as_deref())?;
    let leaderboards = query.leaderboards();
    if leaderboards.is_empty() {
        return Err(AppError::Validation(
            "leaderboardIds: at least one leaderboard id is required".into(),
        ));
    }

    let mut scores = Vec::with_capacity(leaderboards.len());
    for leaderboard in leaderboards {
        let found = state
            .leaderboards
            .get_member(&leaderboard, &member, order, query.score_ttl)
            .await?;

        scores.push(LeaderboardScorePayload {
            leaderboard_id: leaderboard,
            member: member_payload(found),
        });
    }

    Ok(Json(MultiScoresResponse {
        success: true,
        scores,
    }))
}
