//! Ranking service.
//!
//! Turns ordered-set primitives into the leaderboard operations exposed to
//! callers: score writes with their expiration side effects, member
//! lookups, centered windows, pages and top-percentage slices.
//!
//! ## Usage
//!
//! ```ignore
//! let service = RankingService::new(store);
//! let member = service.set_member_score("season_year2024", "dayvson", 481516, true, "").await?;
//! let around = service.get_around_me("season_year2024", 20, "dayvson", Order::Desc, false).await?;
//! ```

mod errors;
mod indexes;
mod ranking;

pub use errors::ServiceError;
pub use ranking::{LeaderboardService, RankingService};

#[cfg(any(test, feature = "mock"))]
pub use ranking::MockLeaderboardService;
