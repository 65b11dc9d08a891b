//! Redis implementation of [`LeaderboardStore`].
//!
//! Every pipeline touches a single key so the same code runs against a
//! cluster. The expiration script touches a leaderboard and its TTL set; when
//! a cluster rejects that pair as cross-slot the same steps are issued one at
//! a time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{ErrorKind, RedisError, Script};
use tracing::debug;

use super::connection::{ClusterProvider, ConnectionProvider};
use super::{EXPIRATION_SETS, ExpirationOutcome, LeaderboardStore, StoreError, ttl_key};
use crate::model::{Order, StoredMember};

/// KEYS[1] leaderboard, KEYS[2] its TTL set. ARGV[1] now, ARGV[2] limit.
/// Returns {deleted members, 1 if the TTL set is gone}.
const EXPIRE_MEMBERS_SCRIPT: &str = r#"
if redis.call("EXISTS", KEYS[2]) == 0 then
  return {0, 1}
end
local due = redis.call("ZRANGEBYSCORE", KEYS[2], "-inf", ARGV[1], "LIMIT", 0, ARGV[2])
if #due > 0 then
  redis.call("ZREM", KEYS[2], unpack(due))
  redis.call("ZREM", KEYS[1], unpack(due))
end
return {#due, 0}
"#;

pub type StandaloneStore = RedisStore<redis::Client>;
pub type ClusterStore = RedisStore<ClusterProvider>;

pub struct RedisStore<P> {
    provider: P,
    expire_script: Script,
}

impl<P: ConnectionProvider> RedisStore<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            expire_script: Script::new(EXPIRE_MEMBERS_SCRIPT),
        }
    }

    async fn expire_members_step_by_step(
        &self,
        leaderboard: &str,
        limit: i64,
        now: i64,
    ) -> Result<ExpirationOutcome, StoreError> {
        let mut conn = self.provider.connection().await?;
        let ttl_key = ttl_key(leaderboard);

        let exists: bool = redis::cmd("EXISTS")
            .arg(&ttl_key)
            .query_async(&mut conn)
            .await?;
        if !exists {
            unregister_ttl_key(&mut conn, &ttl_key).await?;
            return Ok(ExpirationOutcome {
                deleted_members: 0,
                deleted_set: true,
            });
        }

        let due: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(&ttl_key)
            .arg("-inf")
            .arg(now)
            .arg("LIMIT")
            .arg(0)
            .arg(limit)
            .query_async(&mut conn)
            .await?;

        if !due.is_empty() {
            let _: () = redis::cmd("ZREM")
                .arg(&ttl_key)
                .arg(&due)
                .query_async(&mut conn)
                .await?;
            let _: () = redis::cmd("ZREM")
                .arg(leaderboard)
                .arg(&due)
                .query_async(&mut conn)
                .await?;
        }

        Ok(ExpirationOutcome {
            deleted_members: due.len() as i64,
            deleted_set: false,
        })
    }
}

async fn unregister_ttl_key<C>(conn: &mut C, ttl_key: &str) -> Result<(), StoreError>
where
    C: redis::aio::ConnectionLike + Send,
{
    let _: () = redis::cmd("SREM")
        .arg(EXPIRATION_SETS)
        .arg(ttl_key)
        .query_async(conn)
        .await?;
    Ok(())
}

fn is_cross_slot(err: &RedisError) -> bool {
    err.kind() == ErrorKind::CrossSlot
}

#[async_trait]
impl<P: ConnectionProvider> LeaderboardStore for RedisStore<P> {
    async fn healthcheck(&self) -> Result<(), StoreError> {
        let mut conn = self.provider.connection().await?;

        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn set_members(
        &self,
        leaderboard: &str,
        members: &[StoredMember],
    ) -> Result<(), StoreError> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.provider.connection().await?;

        let mut cmd = redis::cmd("ZADD");
        cmd.arg(leaderboard);
        for member in members {
            cmd.arg(member.score).arg(&member.member);
        }

        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn increment_member_score(
        &self,
        leaderboard: &str,
        member: &str,
        increment: f64,
    ) -> Result<f64, StoreError> {
        let mut conn = self.provider.connection().await?;

        let score: f64 = redis::cmd("ZINCRBY")
            .arg(leaderboard)
            .arg(increment)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(score)
    }

    async fn remove_members(
        &self,
        leaderboard: &str,
        members: &[String],
    ) -> Result<(), StoreError> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.provider.connection().await?;

        let _: () = redis::cmd("ZREM")
            .arg(leaderboard)
            .arg(members)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn remove_leaderboard(&self, leaderboard: &str) -> Result<(), StoreError> {
        let mut conn = self.provider.connection().await?;

        let _: () = redis::cmd("DEL").arg(leaderboard).query_async(&mut conn).await?;
        Ok(())
    }

    async fn total_members(&self, leaderboard: &str) -> Result<i64, StoreError> {
        let mut conn = self.provider.connection().await?;

        let total: i64 = redis::cmd("ZCARD").arg(leaderboard).query_async(&mut conn).await?;
        Ok(total)
    }

    async fn get_rank(
        &self,
        leaderboard: &str,
        member: &str,
        order: Order,
    ) -> Result<i64, StoreError> {
        let mut conn = self.provider.connection().await?;

        let rank: Option<i64> = redis::cmd(order.rank_command())
            .arg(leaderboard)
            .arg(member)
            .query_async(&mut conn)
            .await?;

        rank.ok_or_else(|| StoreError::MemberNotFound {
            key: leaderboard.to_string(),
            member: member.to_string(),
        })
    }

    async fn get_score(&self, leaderboard: &str, member: &str) -> Result<f64, StoreError> {
        let mut conn = self.provider.connection().await?;

        let score: Option<f64> = redis::cmd("ZSCORE")
            .arg(leaderboard)
            .arg(member)
            .query_async(&mut conn)
            .await?;

        score.ok_or_else(|| StoreError::MemberNotFound {
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
        if members.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.provider.connection().await?;

        let mut pipe = redis::pipe();
        for member in members {
            pipe.cmd("ZSCORE").arg(leaderboard).arg(member);
            pipe.cmd(order.rank_command()).arg(leaderboard).arg(member);
        }
        let replies: Vec<(Option<f64>, Option<i64>)> = pipe.query_async(&mut conn).await?;

        let ttls: Vec<Option<f64>> = if include_ttl {
            let ttl_key = ttl_key(leaderboard);
            let mut pipe = redis::pipe();
            for member in members {
                pipe.cmd("ZSCORE").arg(&ttl_key).arg(member);
            }
            pipe.query_async(&mut conn).await?
        } else {
            vec![None; members.len()]
        };

        let found = members
            .iter()
            .zip(replies)
            .zip(ttls)
            .map(|((member, reply), ttl)| match reply {
                (Some(score), Some(rank)) => Some(StoredMember {
                    member: member.clone(),
                    score,
                    rank,
                    ttl: ttl.and_then(|ttl| DateTime::from_timestamp(ttl as i64, 0)),
                }),
                _ => None,
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
        let mut conn = self.provider.connection().await?;

        let entries: Vec<(String, f64)> = redis::cmd(order.range_command())
            .arg(leaderboard)
            .arg(start)
            .arg(stop)
            .arg("WITHSCORES")
            .query_async(&mut conn)
            .await?;

        let members = entries
            .into_iter()
            .zip(start..)
            .map(|((member, score), rank)| StoredMember {
                member,
                score,
                rank,
                ttl: None,
            })
            .collect();
        Ok(members)
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
        let mut conn = self.provider.connection().await?;

        let mut cmd = match order {
            Order::Asc => redis::cmd("ZRANGEBYSCORE"),
            Order::Desc => redis::cmd("ZREVRANGEBYSCORE"),
        };
        cmd.arg(leaderboard);
        match order {
            Order::Asc => cmd.arg(min).arg(max),
            Order::Desc => cmd.arg(max).arg(min),
        };
        cmd.arg("LIMIT").arg(offset).arg(count);

        let members: Vec<String> = cmd.query_async(&mut conn).await?;
        Ok(members)
    }

    async fn get_leaderboard_expiration(&self, leaderboard: &str) -> Result<i64, StoreError> {
        let mut conn = self.provider.connection().await?;

        let ttl: i64 = redis::cmd("TTL").arg(leaderboard).query_async(&mut conn).await?;
        match ttl {
            -2 => Err(StoreError::KeyNotFound(leaderboard.to_string())),
            -1 => Err(StoreError::TtlNotFound(leaderboard.to_string())),
            ttl => Ok(ttl),
        }
    }

    async fn set_leaderboard_expiration(
        &self,
        leaderboard: &str,
        expire_at: i64,
    ) -> Result<(), StoreError> {
        let mut conn = self.provider.connection().await?;

        let applied: bool = redis::cmd("EXPIREAT")
            .arg(leaderboard)
            .arg(expire_at)
            .query_async(&mut conn)
            .await?;
        if !applied {
            return Err(StoreError::KeyNotFound(leaderboard.to_string()));
        }
        Ok(())
    }

    async fn set_members_ttl(
        &self,
        leaderboard: &str,
        members: &[StoredMember],
    ) -> Result<(), StoreError> {
        let entries: Vec<(i64, &str)> = members
            .iter()
            .filter_map(|member| Some((member.ttl?.timestamp(), member.member.as_str())))
            .collect();
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.provider.connection().await?;
        let ttl_key = ttl_key(leaderboard);

        let mut cmd = redis::cmd("ZADD");
        cmd.arg(&ttl_key);
        for (expire_at, member) in &entries {
            cmd.arg(*expire_at).arg(*member);
        }
        let _: () = cmd.query_async(&mut conn).await?;

        let _: () = redis::cmd("SADD")
            .arg(EXPIRATION_SETS)
            .arg(&ttl_key)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn get_expiration_sets(&self) -> Result<Vec<String>, StoreError> {
        let mut conn = self.provider.connection().await?;

        let keys: Vec<String> = redis::cmd("SMEMBERS")
            .arg(EXPIRATION_SETS)
            .query_async(&mut conn)
            .await?;
        Ok(keys)
    }

    async fn expire_members(
        &self,
        leaderboard: &str,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<ExpirationOutcome, StoreError> {
        let mut conn = self.provider.connection().await?;
        let ttl_key = ttl_key(leaderboard);
        let now = now.timestamp();

        let result: Result<(i64, i64), RedisError> = self
            .expire_script
            .key(leaderboard)
            .key(&ttl_key)
            .arg(now)
            .arg(limit)
            .invoke_async(&mut conn)
            .await;

        match result {
            Ok((deleted_members, set_missing)) => {
                let deleted_set = set_missing == 1;
                if deleted_set {
                    unregister_ttl_key(&mut conn, &ttl_key).await?;
                }
                Ok(ExpirationOutcome {
                    deleted_members,
                    deleted_set,
                })
            }
            Err(err) if is_cross_slot(&err) => {
                debug!(leaderboard, "cross-slot keys, expiring members step by step");
                drop(conn);
                self.expire_members_step_by_step(leaderboard, limit, now).await
            }
            Err(err) => Err(err.into()),
        }
    }
}
