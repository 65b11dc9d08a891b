//! Ordered-set store adapter.
//!
//! The ranking service and the expiration worker talk to the store only
//! through [`LeaderboardStore`]. Redis is the production backend, reachable
//! either as a single node or as a cluster.
//!
//! ## Key Patterns
//!
//! ```text
//! {leaderboard}        → sorted set of member → score
//! {leaderboard}:ttl    → sorted set of member → expire-at unix timestamp
//! expiration-sets      → set of every {leaderboard}:ttl key ever written
//! ```

mod connection;
mod redis_store;

pub use connection::{ClusterProvider, ConnectionProvider};
pub use redis_store::{ClusterStore, RedisStore, StandaloneStore};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{Order, StoredMember};

/// Registry of TTL keys visited by the expiration worker.
pub const EXPIRATION_SETS: &str = "expiration-sets";

const TTL_SUFFIX: &str = ":ttl";

/// Name of the sorted set holding member TTLs for `leaderboard`.
pub fn ttl_key(leaderboard: &str) -> String {
    format!("{leaderboard}{TTL_SUFFIX}")
}

/// Inverse of [`ttl_key`]. Returns `None` for keys not following the
/// convention.
pub fn leaderboard_from_ttl_key(key: &str) -> Option<&str> {
    key.strip_suffix(TTL_SUFFIX).filter(|leaderboard| !leaderboard.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("could not find member {member} in {key}")]
    MemberNotFound { key: String, member: String },

    #[error("key {0} not found")]
    KeyNotFound(String),

    #[error("ttl for key {0} not found")]
    TtlNotFound(String),

    #[error("{0}")]
    General(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::General(err.to_string())
    }
}

/// Outcome of one expiration pass over a single leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExpirationOutcome {
    /// Members removed from both the leaderboard and its TTL set.
    pub deleted_members: i64,
    /// The TTL set no longer existed and was dropped from the registry.
    pub deleted_set: bool,
}

/// Capability surface over the store's ordered-set primitives.
///
/// Every method is a single logical store operation; nothing here spans a
/// transaction across leaderboards.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait LeaderboardStore: Send + Sync {
    /// Round trip to the store.
    async fn healthcheck(&self) -> Result<(), StoreError>;

    /// Insert or update every member's score in one command.
    async fn set_members(
        &self,
        leaderboard: &str,
        members: &[StoredMember],
    ) -> Result<(), StoreError>;

    /// Add `increment` to a member's score, creating it at `increment` if
    /// absent. Returns the new score.
    async fn increment_member_score(
        &self,
        leaderboard: &str,
        member: &str,
        increment: f64,
    ) -> Result<f64, StoreError>;

    async fn remove_members(&self, leaderboard: &str, members: &[String])
    -> Result<(), StoreError>;

    async fn remove_leaderboard(&self, leaderboard: &str) -> Result<(), StoreError>;

    /// Cardinality of the leaderboard; 0 when the key does not exist.
    async fn total_members(&self, leaderboard: &str) -> Result<i64, StoreError>;

    /// 0-based position of `member` in `order`.
    async fn get_rank(
        &self,
        leaderboard: &str,
        member: &str,
        order: Order,
    ) -> Result<i64, StoreError>;

    async fn get_score(&self, leaderboard: &str, member: &str) -> Result<f64, StoreError>;

    /// Score and rank of each requested member, in request order. Absent
    /// members yield `None`. TTLs are read from the TTL set when
    /// `include_ttl` is set.
    async fn get_members(
        &self,
        leaderboard: &str,
        members: &[String],
        order: Order,
        include_ttl: bool,
    ) -> Result<Vec<Option<StoredMember>>, StoreError>;

    /// Members at indexes `start..=stop` in `order`, each with its 0-based
    /// rank.
    async fn get_ordered_members(
        &self,
        leaderboard: &str,
        start: i64,
        stop: i64,
        order: Order,
    ) -> Result<Vec<StoredMember>, StoreError>;

    /// IDs of members with `min <= score <= max`, walked in `order` and
    /// paginated with `offset`/`count`.
    async fn get_member_ids_with_score_inside_range(
        &self,
        leaderboard: &str,
        min: f64,
        max: f64,
        offset: i64,
        count: i64,
        order: Order,
    ) -> Result<Vec<String>, StoreError>;

    /// Remaining native TTL of the leaderboard key in seconds.
    async fn get_leaderboard_expiration(&self, leaderboard: &str) -> Result<i64, StoreError>;

    /// Attach a native expiry (unix seconds) to the leaderboard key.
    async fn set_leaderboard_expiration(
        &self,
        leaderboard: &str,
        expire_at: i64,
    ) -> Result<(), StoreError>;

    /// Record each member's TTL in the leaderboard's TTL set and register
    /// that set for the expiration worker. Members without a TTL are
    /// skipped.
    async fn set_members_ttl(
        &self,
        leaderboard: &str,
        members: &[StoredMember],
    ) -> Result<(), StoreError>;

    /// Every TTL key currently registered.
    async fn get_expiration_sets(&self) -> Result<Vec<String>, StoreError>;

    /// Remove up to `limit` members whose TTL is at or before `now` from
    /// both the leaderboard and its TTL set. Deregisters the TTL set when it
    /// no longer exists.
    async fn expire_members(
        &self,
        leaderboard: &str,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<ExpirationOutcome, StoreError>;
}

/// Builds the production store. A non-empty `cluster_nodes` selects the
/// cluster topology, otherwise `redis_url` names a single node.
pub fn connect(
    redis_url: &str,
    cluster_nodes: &[String],
) -> Result<Arc<dyn LeaderboardStore>, StoreError> {
    if cluster_nodes.is_empty() {
        let client = redis::Client::open(redis_url)?;
        return Ok(Arc::new(StandaloneStore::new(client)));
    }

    let client = redis::cluster::ClusterClient::new(cluster_nodes.to_vec())?;
    Ok(Arc::new(ClusterStore::new(ClusterProvider::new(client))))
}
