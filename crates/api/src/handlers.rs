//! HTTP handlers, one router per concern. Single-leaderboard routes live
//! under `/l/{leaderboard}`, cross-leaderboard routes under `/m/{member}`.

pub mod health;
pub mod members;
pub mod multi;
pub mod ranking;
pub mod scores;

use leaderboard::{Member, Order};
use shared::api::MemberPayload;

use crate::error::AppError;

/// Missing or empty order means descending; anything else must parse.
fn parse_order(order: Option<&str>) -> Result<Order, AppError> {
    match order {
        None | Some("") => Ok(Order::default()),
        Some(order) => Ok(order.parse()?),
    }
}

fn ensure_page_size(page_size: i64, max: i64) -> Result<i64, AppError> {
    if page_size > max {
        return Err(AppError::Validation(format!(
            "pageSize: max allowed is {max}"
        )));
    }
    Ok(page_size)
}

fn member_payload(member: Member) -> MemberPayload {
    MemberPayload {
        public_id: member.public_id,
        score: member.score,
        rank: member.rank,
        previous_rank: member.previous_rank,
        expire_at: member.expire_at,
    }
}

fn member_payloads(members: Vec<Member>) -> Vec<MemberPayload> {
    members.into_iter().map(member_payload).collect()
}
