use std::sync::Arc;

use leaderboard::LeaderboardService;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Ranking operations over the leaderboard store.
    pub leaderboards: Arc<dyn LeaderboardService>,
}
