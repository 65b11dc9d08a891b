//! Domain types shared by the store adapter, the ranking service and the
//! expiration worker.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sort direction of a leaderboard view.
///
/// `Desc` means the highest score holds rank 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    #[default]
    Desc,
}

/// Returned when an order string is neither `asc` nor `desc`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid order: {0}")]
pub struct InvalidOrder(pub String);

impl Order {
    /// Parses `asc`/`desc`, falling back to `Desc` for anything else.
    pub fn parse_or_default(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Order::Asc => "asc",
            Order::Desc => "desc",
        }
    }

    /// Store command returning a member's 0-based position in this order.
    pub(crate) fn rank_command(&self) -> &'static str {
        match self {
            Order::Asc => "ZRANK",
            Order::Desc => "ZREVRANK",
        }
    }

    /// Store command returning an index window in this order.
    pub(crate) fn range_command(&self) -> &'static str {
        match self {
            Order::Asc => "ZRANGE",
            Order::Desc => "ZREVRANGE",
        }
    }
}

impl FromStr for Order {
    type Err = InvalidOrder;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "asc" => Ok(Order::Asc),
            "desc" => Ok(Order::Desc),
            other => Err(InvalidOrder(other.to_string())),
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A member as seen by callers of the ranking service.
///
/// `rank` and `previous_rank` are 1-based. `previous_rank` is `-1` when the
/// member did not exist before a write and `0` when it was not requested.
/// `expire_at` is a unix timestamp, `0` when no score TTL is set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    #[serde(rename = "publicID")]
    pub public_id: String,
    pub score: i64,
    pub rank: i64,
    pub previous_rank: i64,
    pub expire_at: i64,
}

impl Member {
    pub fn new(public_id: impl Into<String>, score: i64) -> Self {
        Self {
            public_id: public_id.into(),
            score,
            ..Default::default()
        }
    }
}

/// A member as read from or written to the ordered-set store.
///
/// `rank` is the store's 0-based position; `score` is the store's float sort
/// key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoredMember {
    pub member: String,
    pub score: f64,
    pub rank: i64,
    pub ttl: Option<DateTime<Utc>>,
}

impl StoredMember {
    pub fn with_score(member: impl Into<String>, score: f64) -> Self {
        Self {
            member: member.into(),
            score,
            ..Default::default()
        }
    }

    pub fn with_ttl(member: impl Into<String>, ttl: DateTime<Utc>) -> Self {
        Self {
            member: member.into(),
            ttl: Some(ttl),
            ..Default::default()
        }
    }

    pub(crate) fn into_member(self) -> Member {
        Member {
            public_id: self.member,
            score: self.score as i64,
            rank: self.rank + 1,
            previous_rank: 0,
            expire_at: self.ttl.map(|ttl| ttl.timestamp()).unwrap_or_default(),
        }
    }
}
