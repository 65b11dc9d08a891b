//! Windowed reads over a leaderboard.
//!
//! Endpoints:
//! - GET /l/{leaderboard}/members/{member}/around - Page centered on a member
//! - GET /l/{leaderboard}/scores/{score}/around - Page centered on a score
//! - GET /l/{leaderboard}/top/{page} - One page of leaders
//! - GET /l/{leaderboard}/top-percent/{percentage} - Top slice of the board
//! - GET /l/{leaderboard}/members/range?start&stop - Members by index window
//!
//! `pageSize` defaults to 20 and may not exceed `max_returned_members`.

use axum::{
    Json, Router, debug_handler,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
};
use garde::Validate;
use leaderboard::Order;
use shared::api::{MembersResponse, PageQuery, RangeQuery};

use super::{ensure_page_size, member_payloads, parse_order};
use crate::{error::AppError, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{leaderboard}/members/{member}/around", get(get_around_me))
        .route("/{leaderboard}/scores/{score}/around", get(get_around_score))
        .route("/{leaderboard}/top/{page}", get(get_leaders))
        .route(
            "/{leaderboard}/top-percent/{percentage}",
            get(get_top_percentage),
        )
        .route("/{leaderboard}/members/range", get(get_members_by_range))
}

/// Order and page size of a windowed read, checked against the configured
/// maximum.
fn page_params(state: &AppState, query: &PageQuery) -> Result<(Order, i64), AppError> {
    query
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let order = parse_order(query.order.as_deref())?;
    let page_size = ensure_page_size(query.page_size(), state.config.max_returned_members)?;
    Ok((order, page_size))
}

#[debug_handler]
async fn get_around_me(
    State(state): State<AppState>,
    Path((leaderboard, member)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (order, page_size) = page_params(&state, &query)?;

    let members = state
        .leaderboards
        .get_around_me(
            &leaderboard,
            page_size,
            &member,
            order,
            query.get_last_if_not_found,
        )
        .await?;

    Ok(Json(MembersResponse {
        success: true,
        members: member_payloads(members),
    }))
}

#[debug_handler]
async fn get_around_score(
    State(state): State<AppState>,
    Path((leaderboard, score)): Path<(String, i64)>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (order, page_size) = page_params(&state, &query)?;

    let members = state
        .leaderboards
        .get_around_score(&leaderboard, page_size, score, order)
        .await?;

    Ok(Json(MembersResponse {
        success: true,
        members: member_payloads(members),
    }))
}

#[debug_handler]
async fn get_leaders(
    State(state): State<AppState>,
    Path((leaderboard, page)): Path<(String, i64)>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (order, page_size) = page_params(&state, &query)?;

    let members = state
        .leaderboards
        .get_leaders(&leaderboard, page_size, page, order)
        .await?;

    Ok(Json(MembersResponse {
        success: true,
        members: member_payloads(members),
    }))
}

/// Unknown orders fall back to descending here instead of failing.
#[debug_handler]
async fn get_top_percentage(
    State(state): State<AppState>,
    Path((leaderboard, percentage)): Path<(String, i64)>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let order = Order::parse_or_default(query.order.as_deref().unwrap_or_default());

    let members = state
        .leaderboards
        .get_top_percentage(
            &leaderboard,
            percentage,
            state.config.max_returned_members,
            order,
        )
        .await?;

    Ok(Json(MembersResponse {
        success: true,
        members: member_payloads(members),
    }))
}

#[debug_handler]
async fn get_members_by_range(
    State(state): State<AppState>,
    Path(leaderboard): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Result<impl IntoResponse, AppError> {
    query
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let order = parse_order(query.order.as_deref())?;

    let members = state
        .leaderboards
        .get_members_by_range(&leaderboard, query.start, query.stop, order)
        .await?;

    Ok(Json(MembersResponse {
        success: true,
        members: member_payloads(members),
    }))
}
