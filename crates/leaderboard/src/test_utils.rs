//! Shared test utilities for service and worker tests.
//!
//! [`MemoryStore`] is an in-memory [`LeaderboardStore`] that orders members
//! the way Redis does (score, then member bytes), so ranking scenarios run
//! end to end without a server. Use `MockLeaderboardStore` instead when a
//! test needs a store call to fail.
//!
//! ## Usage
//!
//! ```ignore
//! let store = Arc::new(MemoryStore::new());
//! let service = RankingService::new(store.clone());
//! seed(&store, "global", &[("dayvson", 481516.0), ("arthur", 1000.0)]);
//! ```

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{Order, StoredMember};
use crate::service::RankingService;
use crate::store::{
    EXPIRATION_SETS, ExpirationOutcome, LeaderboardStore, StoreError, ttl_key,
};

#[derive(Default)]
struct State {
    sorted_sets: HashMap<String, HashMap<String, f64>>,
    sets: HashMap<String, BTreeSet<String>>,
    expirations: HashMap<String, i64>,
}

impl State {
    fn ordered(&self, key: &str, order: Order) -> Vec<(String, f64)> {
        let mut entries: Vec<(String, f64)> = self
            .sorted_sets
            .get(key)
            .map(|set| set.iter().map(|(m, s)| (m.clone(), *s)).collect())
            .unwrap_or_default();

        entries.sort_by(|(a_member, a_score), (b_member, b_score)| {
            a_score
                .partial_cmp(b_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a_member.cmp(b_member))
        });
        if order == Order::Desc {
            entries.reverse();
        }
        entries
    }

    fn remove_from_sorted_set(&mut self, key: &str, members: &[String]) {
        if let Some(set) = self.sorted_sets.get_mut(key) {
            for member in members {
                set.remove(member);
            }
            if set.is_empty() {
                self.sorted_sets.remove(key);
                self.expirations.remove(key);
            }
        }
    }
}

/// Resolves a Redis-style inclusive index window against `len` entries.
fn resolve_window(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(&self, key: &str, member: &str) -> Option<f64> {
        let state = self.state.lock().unwrap();
        state.sorted_sets.get(key)?.get(member).copied()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.sorted_sets.contains_key(key) || state.sets.contains_key(key)
    }

    pub fn registered_ttl_keys(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .sets
            .get(EXPIRATION_SETS)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn expiration(&self, key: &str) -> Option<i64> {
        self.state.lock().unwrap().expirations.get(key).copied()
    }

    /// Writes raw entries into any sorted set, bypassing the service.
    pub fn insert(&self, key: &str, member: &str, score: f64) {
        let mut state = self.state.lock().unwrap();
        state
            .sorted_sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
    }

    pub fn register(&self, key: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .sets
            .entry(EXPIRATION_SETS.to_string())
            .or_default()
            .insert(key.to_string());
    }
}

#[async_trait]
impl LeaderboardStore for MemoryStore {
    async fn healthcheck(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn set_members(
        &self,
        leaderboard: &str,
        members: &[StoredMember],
    ) -> Result<(), StoreError> {
        for member in members {
            self.insert(leaderboard, &member.member, member.score);
        }
        Ok(())
    }

    async fn increment_member_score(
        &self,
        leaderboard: &str,
        member: &str,
        increment: f64,
    ) -> Result<f64, StoreError> {
        let mut state = self.state.lock().unwrap();
        let score = state
            .sorted_sets
            .entry(leaderboard.to_string())
            .or_default()
            .entry(member.to_string())
            .or_insert(0.0);
        *score += increment;
        Ok(*score)
    }

    async fn remove_members(
        &self,
        leaderboard: &str,
        members: &[String],
    ) -> Result<(), StoreError> {
        self.state
            .lock()
            .unwrap()
            .remove_from_sorted_set(leaderboard, members);
        Ok(())
    }

    async fn remove_leaderboard(&self, leaderboard: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.sorted_sets.remove(leaderboard);
        state.expirations.remove(leaderboard);
        Ok(())
    }

    async fn total_members(&self, leaderboard: &str) -> Result<i64, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.sorted_sets.get(leaderboard).map_or(0, |set| set.len() as i64))
    }

    async fn get_rank(
        &self,
        leaderboard: &str,
        member: &str,
        order: Order,
    ) -> Result<i64, StoreError> {
        let state = self.state.lock().unwrap();
        state
            .ordered(leaderboard, order)
            .iter()
            .position(|(m, _)| m == member)
            .map(|rank| rank as i64)
            .ok_or_else(|| StoreError::MemberNotFound {
                key: leaderboard.to_string(),
                member: member.to_string(),
            })
    }

    async fn get_score(&self, leaderboard: &str, member: &str) -> Result<f64, StoreError> {
        self.score(leaderboard, member)
            .ok_or_else(|| StoreError::MemberNotFound {
                key: leaderboard.to_string(),
                member: member.to_string(),
            })
    }

    async fn get_members(
        &self,
        leaderboard: &str,
        members: &[String],
        order: Order,
        include_ttl: bool,
    ) -> Result<Vec<Option<StoredMember>>, StoreError> {
        let state = self.state.lock().unwrap();
        let ordered = state.ordered(leaderboard, order);
        let ttls = state.sorted_sets.get(&ttl_key(leaderboard));

        let found = members
            .iter()
            .map(|member| {
                let rank = ordered.iter().position(|(m, _)| m == member)?;
                let ttl = ttls
                    .filter(|_| include_ttl)
                    .and_then(|ttls| ttls.get(member))
                    .and_then(|ttl| DateTime::from_timestamp(*ttl as i64, 0));
                Some(StoredMember {
                    member: member.clone(),
                    score: ordered[rank].1,
                    rank: rank as i64,
                    ttl,
                })
            })
            .collect();
        Ok(found)
    }

    async fn get_ordered_members(
        &self,
        leaderboard: &str,
        start: i64,
        stop: i64,
        order: Order,
    ) -> Result<Vec<StoredMember>, StoreError> {
        let state = self.state.lock().unwrap();
        let ordered = state.ordered(leaderboard, order);
        let Some((start, stop)) = resolve_window(start, stop, ordered.len()) else {
            return Ok(Vec::new());
        };

        Ok(ordered[start..=stop]
            .iter()
            .zip(start..)
            .map(|((member, score), rank)| StoredMember {
                member: member.clone(),
                score: *score,
                rank: rank as i64,
                ttl: None,
            })
            .collect())
    }

    async fn get_member_ids_with_score_inside_range(
        &self,
        leaderboard: &str,
        min: f64,
        max: f64,
        offset: i64,
        count: i64,
        order: Order,
    ) -> Result<Vec<String>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .ordered(leaderboard, order)
            .into_iter()
            .filter(|(_, score)| *score >= min && *score <= max)
            .skip(offset as usize)
            .take(count as usize)
            .map(|(member, _)| member)
            .collect())
    }

    async fn get_leaderboard_expiration(&self, leaderboard: &str) -> Result<i64, StoreError> {
        let state = self.state.lock().unwrap();
        if !state.sorted_sets.contains_key(leaderboard) {
            return Err(StoreError::KeyNotFound(leaderboard.to_string()));
        }
        let expire_at = state
            .expirations
            .get(leaderboard)
            .ok_or_else(|| StoreError::TtlNotFound(leaderboard.to_string()))?;
        Ok(expire_at - Utc::now().timestamp())
    }

    async fn set_leaderboard_expiration(
        &self,
        leaderboard: &str,
        expire_at: i64,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if !state.sorted_sets.contains_key(leaderboard) {
            return Err(StoreError::KeyNotFound(leaderboard.to_string()));
        }
        state.expirations.insert(leaderboard.to_string(), expire_at);
        Ok(())
    }

    async fn set_members_ttl(
        &self,
        leaderboard: &str,
        members: &[StoredMember],
    ) -> Result<(), StoreError> {
        let key = ttl_key(leaderboard);
        let mut wrote = false;
        for member in members {
            if let Some(ttl) = member.ttl {
                self.insert(&key, &member.member, ttl.timestamp() as f64);
                wrote = true;
            }
        }
        if wrote {
            self.register(&key);
        }
        Ok(())
    }

    async fn get_expiration_sets(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.registered_ttl_keys())
    }

    async fn expire_members(
        &self,
        leaderboard: &str,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<ExpirationOutcome, StoreError> {
        let key = ttl_key(leaderboard);
        let mut state = self.state.lock().unwrap();

        if !state.sorted_sets.contains_key(&key) {
            if let Some(registry) = state.sets.get_mut(EXPIRATION_SETS) {
                registry.remove(&key);
            }
            return Ok(ExpirationOutcome {
                deleted_members: 0,
                deleted_set: true,
            });
        }

        let now = now.timestamp() as f64;
        let due: Vec<String> = state
            .ordered(&key, Order::Asc)
            .into_iter()
            .filter(|(_, expire_at)| *expire_at <= now)
            .take(limit as usize)
            .map(|(member, _)| member)
            .collect();

        state.remove_from_sorted_set(&key, &due);
        state.remove_from_sorted_set(leaderboard, &due);

        Ok(ExpirationOutcome {
            deleted_members: due.len() as i64,
            deleted_set: false,
        })
    }
}

/// Service over a fresh in-memory store, returning both.
pub fn memory_service() -> (Arc<MemoryStore>, RankingService) {
    let store = Arc::new(MemoryStore::new());
    let service = RankingService::new(store.clone());
    (store, service)
}

/// Writes `(member, score)` pairs straight into `leaderboard`.
pub fn seed(store: &MemoryStore, leaderboard: &str, members: &[(&str, f64)]) {
    for (member, score) in members {
        store.insert(leaderboard, member, *score);
    }
}

/// `member_0..member_{count-1}` with score `step * i`.
pub fn seed_sequence(store: &MemoryStore, leaderboard: &str, count: usize, step: f64) {
    for i in 0..count {
        store.insert(leaderboard, &format!("member_{i}"), step * i as f64);
    }
}
