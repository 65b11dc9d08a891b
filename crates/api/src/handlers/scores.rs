//! Score writes.
//!
//! Endpoints:
//! - PUT /l/{leaderboard}/members/{member}/score - Set one member's score
//! - PATCH /l/{leaderboard}/members/{member}/score - Add to one member's score
//! - PUT /l/{leaderboard}/scores - Set many members' scores
//!
//! Every write accepts `scoreTTL` (seconds until the written scores expire).
//! Set operations also accept `prevRank` to report the rank before the write.

use axum::{
    Json, Router, debug_handler,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::put,
};
use garde::Validate;
use leaderboard::Member;
use shared::api::{
    IncrementScorePayload, MemberResponse, MembersResponse, SetScorePayload, SetScoresPayload,
    WriteQuery,
};

use super::{member_payload, member_payloads};
use crate::{error::AppError, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{leaderboard}/members/{member}/score",
            put(set_member_score).patch(increment_member_score),
        )
        .route("/{leaderboard}/scores", put(set_members_score))
}

#[debug_handler]
async fn set_member_score(
    State(state): State<AppState>,
    Path((leaderboard, member)): Path<(String, String)>,
    Query(query): Query<WriteQuery>,
    Json(payload): Json<SetScorePayload>,
) -> Result<impl IntoResponse, AppError> {
    query
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let member = state
        .leaderboards
        .set_member_score(
            &leaderboard,
            &member,
            payload.score,
            query.prev_rank,
            query.score_ttl.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(Json(MemberResponse {
        success: true,
        member: member_payload(member),
    }))
}

#[debug_handler]
async fn increment_member_score(
    State(state): State<AppState>,
    Path((leaderboard, member)): Path<(String, String)>,
    Query(query): Query<WriteQuery>,
    Json(payload): Json<IncrementScorePayload>,
) -> Result<impl IntoResponse, AppError> {
    query
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let member = state
        .leaderboards
        .increment_member_score(
            &leaderboard,
            &member,
            payload.increment,
            query.score_ttl.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(Json(MemberResponse {
        success: true,
        member: member_payload(member),
    }))
}

#[debug_handler]
async fn set_members_score(
    State(state): State<AppState>,
    Path(leaderboard): Path<String>,
    Query(query): Query<WriteQuery>,
    Json(payload): Json<SetScoresPayload>,
) -> Result<impl IntoResponse, AppError> {
    query
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let members = payload
        .members
        .into_iter()
        .map(|m| Member::new(m.public_id, m.score))
        .collect();

    let written = state
        .leaderboards
        .set_members_score(
            &leaderboard,
            members,
            query.prev_rank,
            query.score_ttl.as_deref().unwrap_or_default(),
        )
        .await?;

    tracing::debug!(leaderboard = %leaderboard, count = written.len(), "scores written");

    Ok(Json(MembersResponse {
        success: true,
        members: member_payloads(written),
    }))
}
