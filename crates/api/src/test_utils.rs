//! Shared test utilities for API handler tests.
//!
//! `TestStateBuilder` constructs an `AppState` around a `MockLeaderboardService`
//! so each test only sets the expectations it needs.
//!
//! ## Usage
//!
//! ```ignore
//! let mut leaderboards = MockLeaderboardService::new();
//! leaderboards.expect_total_members().returning(|_| Ok(10));
//!
//! let state = TestStateBuilder::new()
//!     .with_leaderboard_service(leaderboards)
//!     .build();
//! ```

use std::sync::Arc;

use axum::response::Response;
use http_body_util::BodyExt;
use leaderboard::{Member, MockLeaderboardService};
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::state::AppState;

/// Creates a test configuration with dummy values.
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 3000,
        redis_url: "redis://test".to_string(),
        redis_cluster_nodes: None,
        env: "test".to_string(),
        sentry_dsn: None,
        max_returned_members: 100,
        expiration_check_interval_secs: 60,
        expiration_limit_per_run: 1000,
    }
}

/// Creates a ranked member.
pub fn mock_member(public_id: &str, score: i64, rank: i64) -> Member {
    Member {
        rank,
        ..Member::new(public_id, score)
    }
}

/// Reads a JSON response body.
pub async fn json_body<T: DeserializeOwned>(response: Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Builder for constructing test `AppState` with a custom service mock.
pub struct TestStateBuilder {
    leaderboards: Option<MockLeaderboardService>,
    config: Config,
}

impl TestStateBuilder {
    pub fn new() -> Self {
        Self {
            leaderboards: None,
            config: test_config(),
        }
    }

    pub fn with_leaderboard_service(mut self, service: MockLeaderboardService) -> Self {
        self.leaderboards = Some(service);
        self
    }

    pub fn with_max_returned_members(mut self, max: i64) -> Self {
        self.config.max_returned_members = max;
        self
    }

    /// Builds the `AppState`, with an expectation-free mock when none was set.
    pub fn build(self) -> AppState {
        AppState {
            config: self.config,
            leaderboards: Arc::new(
                self.leaderboards
                    .unwrap_or_else(MockLeaderboardService::new),
            ),
        }
    }
}

impl Default for TestStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
