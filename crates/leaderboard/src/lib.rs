//! Ranked leaderboards on top of a Redis ordered-set store.
//!
//! - [`store`] - the ordered-set adapter (standalone and cluster Redis)
//! - [`expiration`] - leaderboard lifetimes derived from leaderboard names
//! - [`service`] - the ranking operations
//! - [`worker`] - the periodic sweep removing members whose score TTL elapsed

pub mod expiration;
pub mod model;
pub mod service;
pub mod store;
pub mod worker;

#[cfg(test)]
mod test_utils;

pub use model::{InvalidOrder, Member, Order, StoredMember};
pub use service::{LeaderboardService, RankingService, ServiceError};
pub use store::{LeaderboardStore, StoreError};
pub use worker::{ExpirationResult, ExpirationWorker, StopHandle, WorkerConfig};

#[cfg(any(test, feature = "mock"))]
pub use service::MockLeaderboardService;
#[cfg(any(test, feature = "mock"))]
pub use store::MockLeaderboardStore;
