//! Wire types shared by the leaderboard API and its clients.

pub mod api;
