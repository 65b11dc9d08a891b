//! Leaderboard API request/response types used by the server and its clients.

use garde::Validate;
use serde::{Deserialize, Serialize};

/// Page size used when a request does not carry one.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

// ============================================================================
// Request bodies
// ============================================================================

/// Set a member's score.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SetScorePayload {
    #[garde(skip)]
    pub score: i64,
}

/// Add to a member's score.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct IncrementScorePayload {
    #[garde(custom(non_zero))]
    pub increment: i64,
}

fn non_zero(value: &i64, _: &()) -> garde::Result {
    if *value == 0 {
        return Err(garde::Error::new("increment is required"));
    }
    Ok(())
}

/// Max members per bulk score write.
const MAX_BULK_MEMBERS: usize = 2000;

/// Set many members' scores in one leaderboard.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SetScoresPayload {
    #[garde(length(min = 1, max = MAX_BULK_MEMBERS), dive)]
    pub members: Vec<MemberScorePayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MemberScorePayload {
    #[serde(rename = "publicID")]
    #[garde(length(min = 1))]
    pub public_id: String,
    #[garde(skip)]
    pub score: i64,
}

/// Set one member's score in several leaderboards.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct MultiScorePayload {
    #[garde(skip)]
    pub score: i64,
    #[garde(length(min = 1), inner(length(min = 1)))]
    pub leaderboards: Vec<String>,
}

// ============================================================================
// Query strings
// ============================================================================

/// Options shared by every score write.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WriteQuery {
    /// Report each member's rank before the write.
    #[garde(skip)]
    #[serde(default)]
    pub prev_rank: bool,
    /// Seconds until the written scores expire.
    #[serde(rename = "scoreTTL")]
    #[garde(custom(seconds))]
    pub score_ttl: Option<String>,
}

fn seconds(value: &Option<String>, _: &()) -> garde::Result {
    match value.as_deref() {
        None | Some("") => Ok(()),
        Some(value) => value
            .parse::<i64>()
            .map(|_| ())
            .map_err(|_| garde::Error::new("must be a whole number of seconds")),
    }
}

/// Lookup of one or many members.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct MemberQuery {
    #[garde(skip)]
    pub order: Option<String>,
    /// Include each member's score expiration.
    #[serde(rename = "scoreTTL", default)]
    #[garde(skip)]
    pub score_ttl: bool,
    /// Comma-separated member IDs, for bulk lookups and removals.
    #[garde(skip)]
    pub ids: Option<String>,
}

impl MemberQuery {
    /// Non-empty IDs from `ids`.
    pub fn member_ids(&self) -> Vec<String> {
        self.ids
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Lookup of one member across several leaderboards.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MultiRankQuery {
    #[garde(skip)]
    pub order: Option<String>,
    #[serde(rename = "scoreTTL", default)]
    #[garde(skip)]
    pub score_ttl: bool,
    /// Comma-separated leaderboard IDs.
    #[garde(skip)]
    pub leaderboard_ids: Option<String>,
}

impl MultiRankQuery {
    /// Non-empty IDs from `leaderboardIds`, in request order.
    pub fn leaderboards(&self) -> Vec<String> {
        self.leaderboard_ids
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Order and page size for windowed reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    #[garde(skip)]
    pub order: Option<String>,
    #[garde(range(min = 1))]
    pub page_size: Option<i64>,
    /// Around-me only: center on the last place when the member is absent.
    #[garde(skip)]
    #[serde(default)]
    pub get_last_if_not_found: bool,
}

impl PageQuery {
    pub fn page_size(&self) -> i64 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }
}

/// Inclusive 0-based index window.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[garde(allow_unvalidated)]
pub struct RangeQuery {
    #[garde(range(min = 0))]
    pub start: i64,
    #[garde(custom(not_before(&self.start)))]
    pub stop: i64,
    pub order: Option<String>,
}

fn not_before(start: &i64) -> impl FnOnce(&i64, &()) -> garde::Result + '_ {
    move |stop, _| {
        if stop < start {
            return Err(garde::Error::new("stop must not be lower than start"));
        }
        Ok(())
    }
}

// ============================================================================
// Responses
// ============================================================================

/// A member as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberPayload {
    #[serde(rename = "publicID")]
    pub public_id: String,
    pub score: i64,
    pub rank: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub previous_rank: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub expire_at: i64,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MemberResponse {
    pub success: bool,
    #[serde(flatten)]
    pub member: MemberPayload,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MembersResponse {
    pub success: bool,
    pub members: Vec<MemberPayload>,
}

/// Bulk lookup result: found members by rank plus IDs not on the board.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMembersResponse {
    pub success: bool,
    pub members: Vec<MemberPayload>,
    pub not_found: Vec<String>,
}

/// A member's standing in one of several leaderboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardScorePayload {
    #[serde(rename = "leaderboardID")]
    pub leaderboard_id: String,
    #[serde(flatten)]
    pub member: MemberPayload,
}

/// One entry per requested leaderboard, in request order.
#[derive(Debug, Serialize, Deserialize)]
pub struct MultiScoresResponse {
    pub success: bool,
    pub scores: Vec<LeaderboardScorePayload>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RankResponse {
    pub success: bool,
    #[serde(rename = "publicID")]
    pub public_id: String,
    pub rank: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub success: bool,
    pub count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub success: bool,
    pub status: String,
}

/// Body of every failed request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub reason: String,
}
