//! Rank-consistent views over the ordered-set store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::errors::ServiceError;
use super::indexes::{self, Window};
use crate::expiration::{self, ExpirationError};
use crate::model::{Member, Order, StoredMember};
use crate::store::{LeaderboardStore, StoreError};

const SET_MEMBER_SCORE: &str = "set member score";
const SET_MEMBERS_SCORE: &str = "set members score";
const INCREMENT_MEMBER_SCORE: &str = "increment member score";
const GET_AROUND_ME: &str = "get around me";
const GET_AROUND_SCORE: &str = "get around score";
const GET_LEADERS: &str = "get leaders";
const GET_MEMBER: &str = "get member";
const GET_MEMBERS: &str = "get members";
const GET_MEMBERS_BY_RANGE: &str = "get members by range";
const GET_RANK: &str = "get rank";
const GET_TOP_PERCENTAGE: &str = "get top percentage";
const HEALTHCHECK: &str = "healthcheck";
const TOTAL_MEMBERS: &str = "total members";
const TOTAL_PAGES: &str = "total pages";
const REMOVE_LEADERBOARD: &str = "remove leaderboard";
const REMOVE_MEMBER: &str = "remove member";
const REMOVE_MEMBERS: &str = "remove members";

/// Ranks reported after a write are always descending.
const WRITE_ORDER: Order = Order::Desc;

/// Every externally visible leaderboard operation.
///
/// Operations on different leaderboards are independent; sequences of store
/// calls inside one operation are not transactional.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait LeaderboardService: Send + Sync {
    /// Write one score. `score_ttl` is a number of seconds, empty for none.
    async fn set_member_score(
        &self,
        leaderboard: &str,
        member: &str,
        score: i64,
        previous_rank: bool,
        score_ttl: &str,
    ) -> Result<Member, ServiceError>;

    /// Write many scores in one batch. Returned members keep input order.
    async fn set_members_score(
        &self,
        leaderboard: &str,
        members: Vec<Member>,
        previous_rank: bool,
        score_ttl: &str,
    ) -> Result<Vec<Member>, ServiceError>;

    async fn increment_member_score(
        &self,
        leaderboard: &str,
        member: &str,
        increment: i64,
        score_ttl: &str,
    ) -> Result<Member, ServiceError>;

    async fn get_member(
        &self,
        leaderboard: &str,
        member: &str,
        order: Order,
        include_ttl: bool,
    ) -> Result<Member, ServiceError>;

    /// One slot per requested member, `None` for members not on the board.
    async fn get_members(
        &self,
        leaderboard: &str,
        members: &[String],
        order: Order,
        include_ttl: bool,
    ) -> Result<Vec<Option<Member>>, ServiceError>;

    async fn get_rank(
        &self,
        leaderboard: &str,
        member: &str,
        order: Order,
    ) -> Result<i64, ServiceError>;

    async fn get_around_me(
        &self,
        leaderboard: &str,
        page_size: i64,
        member: &str,
        order: Order,
        get_last_if_not_found: bool,
    ) -> Result<Vec<Member>, ServiceError>;

    async fn get_around_score(
        &self,
        leaderboard: &str,
        page_size: i64,
        score: i64,
        order: Order,
    ) -> Result<Vec<Member>, ServiceError>;

    /// 1-based `page`; pages below 1 read page 1, pages past the end are
    /// empty.
    async fn get_leaders(
        &self,
        leaderboard: &str,
        page_size: i64,
        page: i64,
        order: Order,
    ) -> Result<Vec<Member>, ServiceError>;

    async fn get_top_percentage(
        &self,
        leaderboard: &str,
        percentage: i64,
        max_members: i64,
        order: Order,
    ) -> Result<Vec<Member>, ServiceError>;

    async fn get_members_by_range(
        &self,
        leaderboard: &str,
        start: i64,
        stop: i64,
        order: Order,
    ) -> Result<Vec<Member>, ServiceError>;

    async fn total_members(&self, leaderboard: &str) -> Result<i64, ServiceError>;

    async fn total_pages(&self, leaderboard: &str, page_size: i64) -> Result<i64, ServiceError>;

    /// Removes from the leaderboard only; stale TTL entries are left to the
    /// expiration worker.
    async fn remove_member(&self, leaderboard: &str, member: &str) -> Result<(), ServiceError>;

    async fn remove_members(
        &self,
        leaderboard: &str,
        members: &[String],
    ) -> Result<(), ServiceError>;

    async fn remove_leaderboard(&self, leaderboard: &str) -> Result<(), ServiceError>;

    async fn healthcheck(&self) -> Result<(), ServiceError>;
}

/// [`LeaderboardService`] backed by a [`LeaderboardStore`].
#[derive(Clone)]
pub struct RankingService {
    store: Arc<dyn LeaderboardStore>,
}

impl RankingService {
    pub fn new(store: Arc<dyn LeaderboardStore>) -> Self {
        Self { store }
    }

    async fn write_members(
        &self,
        service: &'static str,
        leaderboard: &str,
        mut members: Vec<Member>,
        previous_rank: bool,
        score_ttl: &str,
    ) -> Result<Vec<Member>, ServiceError> {
        let score_ttl = parse_score_ttl(score_ttl)?;

        if previous_rank {
            self.set_previous_ranks(leaderboard, &mut members)
                .await
                .map_err(|err| ServiceError::general(service, err))?;
        }

        let stored: Vec<StoredMember> = members
            .iter()
            .map(|member| StoredMember::with_score(&member.public_id, member.score as f64))
            .collect();
        self.store
            .set_members(leaderboard, &stored)
            .await
            .map_err(|err| ServiceError::general(service, err))?;

        self.refresh_members(leaderboard, &mut members)
            .await
            .map_err(|err| ServiceError::general(service, err))?;

        self.persist_leaderboard_expiration(service, leaderboard).await?;

        if let Some(ttl) = score_ttl {
            self.persist_members_ttl(service, leaderboard, &mut members, ttl)
                .await?;
        }

        Ok(members)
    }

    async fn current_slots(
        &self,
        leaderboard: &str,
        members: &[Member],
    ) -> Result<Vec<Option<StoredMember>>, StoreError> {
        let ids: Vec<String> = members.iter().map(|m| m.public_id.clone()).collect();
        self.store
            .get_members(leaderboard, &ids, WRITE_ORDER, false)
            .await
    }

    /// Non-atomic with the write that follows it.
    async fn set_previous_ranks(
        &self,
        leaderboard: &str,
        members: &mut [Member],
    ) -> Result<(), StoreError> {
        let current = self.current_slots(leaderboard, members).await?;

        for (member, stored) in members.iter_mut().zip(current) {
            member.previous_rank = stored.map(|stored| stored.rank + 1).unwrap_or(-1);
        }
        Ok(())
    }

    /// Re-reads rank and score of freshly written members.
    async fn refresh_members(
        &self,
        leaderboard: &str,
        members: &mut [Member],
    ) -> Result<(), StoreError> {
        let current = self.current_slots(leaderboard, members).await?;

        for (member, stored) in members.iter_mut().zip(current) {
            let stored = stored.ok_or_else(|| StoreError::MemberNotFound {
                key: leaderboard.to_string(),
                member: member.public_id.clone(),
            })?;
            member.rank = stored.rank + 1;
            member.score = stored.score as i64;
        }
        Ok(())
    }

    /// Attaches the name-derived expiry to the leaderboard key unless it
    /// already has one.
    async fn persist_leaderboard_expiration(
        &self,
        service: &'static str,
        leaderboard: &str,
    ) -> Result<(), ServiceError> {
        let expire_at = match expiration::expire_at(leaderboard) {
            Ok(Some(expire_at)) => expire_at,
            Ok(None) => return Ok(()),
            Err(ExpirationError::LeaderboardExpired(_)) => {
                return Err(ServiceError::LeaderboardExpired(leaderboard.to_string()));
            }
            Err(err) => return Err(ServiceError::general(service, err)),
        };

        match self.store.get_leaderboard_expiration(leaderboard).await {
            Ok(_) => Ok(()),
            Err(StoreError::TtlNotFound(_)) => {
                debug!(leaderboard, expire_at, "setting leaderboard expiration");
                self.store
                    .set_leaderboard_expiration(leaderboard, expire_at)
                    .await
                    .map_err(|err| ServiceError::general(service, err))
            }
            Err(err) => Err(ServiceError::general(service, err)),
        }
    }

    async fn persist_members_ttl(
        &self,
        service: &'static str,
        leaderboard: &str,
        members: &mut [Member],
        ttl: i64,
    ) -> Result<(), ServiceError> {
        let expire_at = Utc::now().timestamp().saturating_add(ttl);
        let expires: DateTime<Utc> = DateTime::from_timestamp(expire_at, 0)
            .ok_or_else(|| ServiceError::general(service, format!("score ttl {ttl} out of range")))?;

        let stored: Vec<StoredMember> = members
            .iter_mut()
            .map(|member| {
                member.expire_at = expire_at;
                StoredMember::with_ttl(&member.public_id, expires)
            })
            .collect();

        self.store
            .set_members_ttl(leaderboard, &stored)
            .await
            .map_err(|err| ServiceError::general(service, err))
    }

    /// 1-based rank of `member`; one past the last rank when the member is
    /// absent and `get_last_if_not_found` is set.
    async fn fetch_member_rank(
        &self,
        leaderboard: &str,
        member: &str,
        order: Order,
        get_last_if_not_found: bool,
    ) -> Result<i64, StoreError> {
        match self.store.get_rank(leaderboard, member, order).await {
            Ok(rank) => Ok(rank + 1),
            Err(StoreError::MemberNotFound { .. }) if get_last_if_not_found => {
                Ok(self.store.total_members(leaderboard).await? + 1)
            }
            Err(err) => Err(err),
        }
    }

    async fn members_around_rank(
        &self,
        leaderboard: &str,
        rank: i64,
        page_size: i64,
        order: Order,
    ) -> Result<Vec<Member>, StoreError> {
        let total = self.store.total_members(leaderboard).await?;
        let Some(window) = indexes::around_rank(rank, page_size, total) else {
            return Ok(Vec::new());
        };
        self.ordered_members(leaderboard, window, order).await
    }

    async fn ordered_members(
        &self,
        leaderboard: &str,
        window: Window,
        order: Order,
    ) -> Result<Vec<Member>, StoreError> {
        let stored = self
            .store
            .get_ordered_members(leaderboard, window.start, window.stop, order)
            .await?;
        Ok(stored.into_iter().map(StoredMember::into_member).collect())
    }

    async fn ensure_valid_page(
        &self,
        leaderboard: &str,
        page_size: i64,
        page: i64,
    ) -> Result<(), ServiceError> {
        let total = self
            .store
            .total_members(leaderboard)
            .await
            .map_err(|err| ServiceError::general(GET_LEADERS, err))?;

        let total_pages = indexes::total_pages(total, page_size);
        if page < 1 || page > total_pages {
            return Err(ServiceError::PageOutOfRange { page, total_pages });
        }
        Ok(())
    }
}

/// Seconds from a string-encoded score TTL; `None` when empty. Checked
/// before any write so a bad TTL leaves the leaderboard untouched.
fn parse_score_ttl(score_ttl: &str) -> Result<Option<i64>, ServiceError> {
    if score_ttl.is_empty() {
        return Ok(None);
    }
    score_ttl
        .parse()
        .map(Some)
        .map_err(|_| ServiceError::InvalidScoreTtl(score_ttl.to_string()))
}

/// Maps a store miss to the service-level miss, anything else to a general
/// error.
fn classify(service: &'static str, leaderboard: &str, member: &str, err: StoreError) -> ServiceError {
    match err {
        StoreError::MemberNotFound { .. } => ServiceError::member_not_found(leaderboard, member),
        err => ServiceError::general(service, err),
    }
}

#[async_trait]
impl LeaderboardService for RankingService {
    async fn set_member_score(
        &self,
        leaderboard: &str,
        member: &str,
        score: i64,
        previous_rank: bool,
        score_ttl: &str,
    ) -> Result<Member, ServiceError> {
        let members = vec![Member::new(member, score)];
        let mut written = self
            .write_members(SET_MEMBER_SCORE, leaderboard, members, previous_rank, score_ttl)
            .await?;

        written
            .pop()
            .ok_or_else(|| ServiceError::general(SET_MEMBER_SCORE, "no member written"))
    }

    async fn set_members_score(
        &self,
        leaderboard: &str,
        members: Vec<Member>,
        previous_rank: bool,
        score_ttl: &str,
    ) -> Result<Vec<Member>, ServiceError> {
        self.write_members(SET_MEMBERS_SCORE, leaderboard, members, previous_rank, score_ttl)
            .await
    }

    async fn increment_member_score(
        &self,
        leaderboard: &str,
        member: &str,
        increment: i64,
        score_ttl: &str,
    ) -> Result<Member, ServiceError> {
        let score_ttl = parse_score_ttl(score_ttl)?;

        self.store
            .increment_member_score(leaderboard, member, increment as f64)
            .await
            .map_err(|err| ServiceError::general(INCREMENT_MEMBER_SCORE, err))?;

        let mut members = vec![Member::new(member, increment)];
        self.refresh_members(leaderboard, &mut members)
            .await
            .map_err(|err| ServiceError::general(INCREMENT_MEMBER_SCORE, err))?;

        self.persist_leaderboard_expiration(INCREMENT_MEMBER_SCORE, leaderboard)
            .await?;

        if let Some(ttl) = score_ttl {
            self.persist_members_ttl(INCREMENT_MEMBER_SCORE, leaderboard, &mut members, ttl)
                .await?;
        }

        members
            .pop()
            .ok_or_else(|| ServiceError::general(INCREMENT_MEMBER_SCORE, "no member written"))
    }

    async fn get_member(
        &self,
        leaderboard: &str,
        member: &str,
        order: Order,
        include_ttl: bool,
    ) -> Result<Member, ServiceError> {
        let ids = [member.to_string()];
        let found = self
            .store
            .get_members(leaderboard, &ids, order, include_ttl)
            .await
            .map_err(|err| ServiceError::general(GET_MEMBER, err))?;

        found
            .into_iter()
            .next()
            .flatten()
            .map(StoredMember::into_member)
            .ok_or_else(|| ServiceError::member_not_found(leaderboard, member))
    }

    async fn get_members(
        &self,
        leaderboard: &str,
        members: &[String],
        order: Order,
        include_ttl: bool,
    ) -> Result<Vec<Option<Member>>, ServiceError> {
        let found = self
            .store
            .get_members(leaderboard, members, order, include_ttl)
            .await
            .map_err(|err| ServiceError::general(GET_MEMBERS, err))?;

        Ok(found
            .into_iter()
            .map(|slot| slot.map(StoredMember::into_member))
            .collect())
    }

    async fn get_rank(
        &self,
        leaderboard: &str,
        member: &str,
        order: Order,
    ) -> Result<i64, ServiceError> {
        self.fetch_member_rank(leaderboard, member, order, false)
            .await
            .map_err(|err| classify(GET_RANK, leaderboard, member, err))
    }

    async fn get_around_me(
        &self,
        leaderboard: &str,
        page_size: i64,
        member: &str,
        order: Order,
        get_last_if_not_found: bool,
    ) -> Result<Vec<Member>, ServiceError> {
        let rank = self
            .fetch_member_rank(leaderboard, member, order, get_last_if_not_found)
            .await
            .map_err(|err| classify(GET_AROUND_ME, leaderboard, member, err))?;

        self.members_around_rank(leaderboard, rank, page_size, order)
            .await
            .map_err(|err| ServiceError::general(GET_AROUND_ME, err))
    }

    async fn get_around_score(
        &self,
        leaderboard: &str,
        page_size: i64,
        score: i64,
        order: Order,
    ) -> Result<Vec<Member>, ServiceError> {
        let closest = self
            .store
            .get_member_ids_with_score_inside_range(
                leaderboard,
                f64::NEG_INFINITY,
                score as f64,
                0,
                1,
                Order::Desc,
            )
            .await
            .map_err(|err| ServiceError::general(GET_AROUND_SCORE, err))?;

        let rank = match closest.first() {
            Some(member) => self
                .fetch_member_rank(leaderboard, member, order, false)
                .await
                .map_err(|err| classify(GET_AROUND_SCORE, leaderboard, member, err))?,
            None => {
                let total = self
                    .store
                    .total_members(leaderboard)
                    .await
                    .map_err(|err| ServiceError::general(GET_AROUND_SCORE, err))?;
                total + 1
            }
        };

        self.members_around_rank(leaderboard, rank, page_size, order)
            .await
            .map_err(|err| ServiceError::general(GET_AROUND_SCORE, err))
    }

    async fn get_leaders(
        &self,
        leaderboard: &str,
        page_size: i64,
        page: i64,
        order: Order,
    ) -> Result<Vec<Member>, ServiceError> {
        if page_size < 1 {
            return Ok(Vec::new());
        }

        let page = page.max(1);
        match self.ensure_valid_page(leaderboard, page_size, page).await {
            Ok(()) => {}
            Err(ServiceError::PageOutOfRange { page, total_pages }) => {
                debug!(leaderboard, page, total_pages, "page out of range");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        }

        self.ordered_members(leaderboard, indexes::page(page, page_size), order)
            .await
            .map_err(|err| ServiceError::general(GET_LEADERS, err))
    }

    async fn get_top_percentage(
        &self,
        leaderboard: &str,
        percentage: i64,
        max_members: i64,
        order: Order,
    ) -> Result<Vec<Member>, ServiceError> {
        if !(1..=100).contains(&percentage) {
            return Err(ServiceError::Percentage(percentage));
        }

        let total = self
            .store
            .total_members(leaderboard)
            .await
            .map_err(|err| ServiceError::general(GET_TOP_PERCENTAGE, err))?;
        if total == 0 {
            return Ok(Vec::new());
        }

        let count = indexes::top_count(total, percentage, max_members);
        let window = Window {
            start: 0,
            stop: count - 1,
        };
        self.ordered_members(leaderboard, window, order)
            .await
            .map_err(|err| ServiceError::general(GET_TOP_PERCENTAGE, err))
    }

    async fn get_members_by_range(
        &self,
        leaderboard: &str,
        start: i64,
        stop: i64,
        order: Order,
    ) -> Result<Vec<Member>, ServiceError> {
        self.ordered_members(leaderboard, Window { start, stop }, order)
            .await
            .map_err(|err| ServiceError::general(GET_MEMBERS_BY_RANGE, err))
    }

    async fn total_members(&self, leaderboard: &str) -> Result<i64, ServiceError> {
        self.store
            .total_members(leaderboard)
            .await
            .map_err(|err| ServiceError::general(TOTAL_MEMBERS, err))
    }

    async fn total_pages(&self, leaderboard: &str, page_size: i64) -> Result<i64, ServiceError> {
        let total = self
            .store
            .total_members(leaderboard)
            .await
            .map_err(|err| ServiceError::general(TOTAL_PAGES, err))?;
        Ok(indexes::total_pages(total, page_size))
    }

    async fn remove_member(&self, leaderboard: &str, member: &str) -> Result<(), ServiceError> {
        self.store
            .remove_members(leaderboard, &[member.to_string()])
            .await
            .map_err(|err| ServiceError::general(REMOVE_MEMBER, err))
    }

    async fn remove_members(
        &self,
        leaderboard: &str,
        members: &[String],
    ) -> Result<(), ServiceError> {
        self.store
            .remove_members(leaderboard, members)
            .await
            .map_err(|err| ServiceError::general(REMOVE_MEMBERS, err))
    }

    async fn remove_leaderboard(&self, leaderboard: &str) -> Result<(), ServiceError> {
        self.store
            .remove_leaderboard(leaderboard)
            .await
            .map_err(|err| ServiceError::general(REMOVE_LEADERBOARD, err))
    }

    async fn healthcheck(&self) -> Result<(), ServiceError> {
        self.store.healthcheck().await.map_err(|err| {
            warn!(error = %err, "store healthcheck failed");
            ServiceError::general(HEALTHCHECK, err)
        })
    }
}
