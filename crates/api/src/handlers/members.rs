//! Member lookups and removals.
//!
//! Endpoints:
//! - GET /l/{leaderboard}/members/{member} - One member's score and rank
//! - GET /l/{leaderboard}/members?ids=a,b - Many members, plus the IDs not found
//! - GET /l/{leaderboard}/members/{member}/rank - One member's rank
//! - GET /l/{leaderboard}/members-count - Number of members
//! - DELETE /l/{leaderboard}/members/{member} - Remove one member
//! - DELETE /l/{leaderboard}/members?ids=a,b - Remove many members
//! - DELETE /l/{leaderboard} - Remove the whole leaderboard

use axum::{
    Json, Router, debug_handler,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get},
};
use shared::api::{
    CountResponse, GetMembersResponse, MemberQuery, MemberResponse, RankResponse, SuccessResponse,
};

use super::{member_payload, parse_order};
use crate::{error::AppError, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{leaderboard}", delete(remove_leaderboard))
        .route(
            "/{leaderboard}/members",
            get(get_members).delete(remove_members),
        )
        .route(
            "/{leaderboard}/members/{member}",
            get(get_member).delete(remove_member),
        )
        .route("/{leaderboard}/members/{member}/rank", get(get_rank))
        .route("/{leaderboard}/members-count", get(total_members))
}

fn required_ids(query: &MemberQuery) -> Result<Vec<String>, AppError> {
    let ids = query.member_ids();
    if ids.is_empty() {
        return Err(AppError::Validation(
            "ids: at least one member id is required".into(),
        ));
    }
    Ok(ids)
}

#[debug_handler]
async fn get_member(
    State(state): State<AppState>,
    Path((leaderboard, member)): Path<(String, String)>,
    Query(query): Query<MemberQuery>,
) -> Result<impl IntoResponse, AppError> {
    let order = parse_order(query.order.as_deref())?;

    let member = state
        .leaderboards
        .get_member(&leaderboard, &member, order, query.score_ttl)
        .await?;

    Ok(Json(MemberResponse {
        success: true,
        member: member_payload(member),
    }))
}

/// Found members are listed by rank; absent IDs go to `notFound` in request
/// order.
#[debug_handler]
async fn get_members(
    State(state): State<AppState>,
    Path(leaderboard): Path<String>,
    Query(query): Query<MemberQuery>,
) -> Result<impl IntoResponse, AppError> {
    let order = parse_order(query.order.as_deref())?;
    let ids = required_ids(&query)?;

    let slots = state
        .leaderboards
        .get_members(&leaderboard, &ids, order, query.score_ttl)
        .await?;

    let mut members = Vec::new();
    let mut not_found = Vec::new();
    for (id, slot) in ids.into_iter().zip(slots) {
        match slot {
            Some(member) => members.push(member_payload(member)),
            None => not_found.push(id),
        }
    }
    members.sort_by_key(|member| member.rank);

    Ok(Json(GetMembersResponse {
        success: true,
        members,
        not_found,
    }))
}

#[debug_handler]
async fn get_rank(
    State(state): State<AppState>,
    Path((leaderboard, member)): Path<(String, String)>,
    Query(query): Query<MemberQuery>,
) -> Result<impl IntoResponse, AppError> {
    let order = parse_order(query.order.as_deref())?;

    let rank = state
        .leaderboards
        .get_rank(&leaderboard, &member, order)
        .await?;

    Ok(Json(RankResponse {
        success: true,
        public_id: member,
        rank,
    }))
}

#[debug_handler]
async fn total_members(
    State(state): State<AppState>,
    Path(leaderboard): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let count = state.leaderboards.total_members(&leaderboard).await?;

    Ok(Json(CountResponse {
        success: true,
        count,
    }))
}

#[debug_handler]
async fn remove_member(
    State(state): State<AppState>,
    Path((leaderboard, member)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    state
        .leaderboards
        .remove_member(&leaderboard, &member)
        .await?;

    tracing::info!(leaderboard = %leaderboard, member = %member, "member removed");

    Ok(Json(SuccessResponse { success: true }))
}

#[debug_handler]
async fn remove_members(
    State(state): State<AppState>,
    Path(leaderboard): Path<String>,
    Query(query): Query<MemberQuery>,
) -> Result<impl IntoResponse, AppError> {
    let ids = required_ids(&query)?;

    state.leaderboards.remove_members(&leaderboard, &ids).await?;

    tracing::info!(leaderboard = %leaderboard, count = ids.len(), "members removed");

    Ok(Json(SuccessResponse { success: true }))
}

#[debug_handler]
async fn remove_leaderboard(
    State(state): State<AppState>,
    Path(leaderboard): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.leaderboards.remove_leaderboard(&leaderboard).await?;

    tracing::info!(leaderboard = %leaderboard, "leaderboard removed");

    Ok(Json(SuccessResponse { success: true }))
}
