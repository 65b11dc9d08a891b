//! Leaderboard lifetimes derived from leaderboard names.
//!
//! A leaderboard whose ID ends with one of the suffixes below gets a native
//! key expiry. Rules are tried in order; the first match wins.
//!
//! ```text
//! ..._from1700000000to1700600000   → end + (end - start)
//! ..._from20240101to20240131       → end + (end - start)
//! ..._year2024                     → 2024-01-01 + 2 years
//! ..._year2024month3               → 2024-03-01 + 2 months
//! ..._year2024quarter2             → 2024-04-01 + 6 months
//! ..._year2024week10               → Monday of ISO week 10 + 14 days
//! ```
//!
//! Names matching no rule never expire.

use std::sync::LazyLock;

use chrono::{DateTime, Days, Months, NaiveDate, NaiveTime, Utc, Weekday};
use regex::{Captures, Regex};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpirationError {
    #[error("invalid duration for leaderboard {leaderboard}: {seconds}s")]
    InvalidDuration { leaderboard: String, seconds: i64 },

    #[error("leaderboard {0} has already expired")]
    LeaderboardExpired(String),

    #[error("malformed expiration in leaderboard name {leaderboard}: {reason}")]
    InvalidName { leaderboard: String, reason: String },
}

type Expire = fn(&str, &Captures<'_>, DateTime<Utc>) -> Result<i64, ExpirationError>;

struct Rule {
    pattern: Regex,
    expire: Expire,
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    let rule = |pattern: &str, expire: Expire| Rule {
        pattern: Regex::new(pattern).expect("expiration patterns are valid"),
        expire,
    };

    vec![
        rule(r"from([0-9]{10})to([0-9]{10})$", unix_range),
        rule(r"from([0-9]{4}[01][0-9][0-3][0-9])to([0-9]{4}[01][0-9][0-3][0-9])$", date_range),
        rule(r"year([0-9]{4})$", yearly),
        rule(r"year([0-9]{4})(week|quarter|month)([0-9]{1,2})$", calendar_unit),
    ]
});

/// Computes the unix timestamp at which `leaderboard` expires, relative to
/// the current time.
pub fn expire_at(leaderboard: &str) -> Result<Option<i64>, ExpirationError> {
    expire_at_from(leaderboard, Utc::now())
}

/// Computes the unix timestamp at which `leaderboard` expires, as seen at
/// `now`. Returns `None` for names without an expiration suffix.
pub fn expire_at_from(
    leaderboard: &str,
    now: DateTime<Utc>,
) -> Result<Option<i64>, ExpirationError> {
    for rule in RULES.iter() {
        let Some(captures) = rule.pattern.captures(leaderboard) else {
            continue;
        };

        let expire_at = (rule.expire)(leaderboard, &captures, now)?;
        if expire_at <= now.timestamp() {
            return Err(ExpirationError::LeaderboardExpired(leaderboard.to_string()));
        }
        return Ok(Some(expire_at));
    }

    Ok(None)
}

fn unix_range(
    leaderboard: &str,
    captures: &Captures<'_>,
    _now: DateTime<Utc>,
) -> Result<i64, ExpirationError> {
    let start = parse_number::<i64>(leaderboard, &captures[1])?;
    let end = parse_number::<i64>(leaderboard, &captures[2])?;
    with_grace_period(leaderboard, start, end)
}

fn date_range(
    leaderboard: &str,
    captures: &Captures<'_>,
    _now: DateTime<Utc>,
) -> Result<i64, ExpirationError> {
    let start = parse_date(leaderboard, &captures[1])?;
    let end = parse_date(leaderboard, &captures[2])?;
    with_grace_period(leaderboard, start, end)
}

fn yearly(
    leaderboard: &str,
    captures: &Captures<'_>,
    _now: DateTime<Utc>,
) -> Result<i64, ExpirationError> {
    let year = parse_number::<i32>(leaderboard, &captures[1])?;
    let start = first_day(leaderboard, year, 1)?;
    add_months(leaderboard, start, 24)
}

fn calendar_unit(
    leaderboard: &str,
    captures: &Captures<'_>,
    _now: DateTime<Utc>,
) -> Result<i64, ExpirationError> {
    let year = parse_number::<i32>(leaderboard, &captures[1])?;
    let value = parse_number::<u32>(leaderboard, &captures[3])?;

    match &captures[2] {
        "month" => {
            let start = first_day(leaderboard, year, value)?;
            add_months(leaderboard, start, 2)
        }
        "quarter" => {
            if !(1..=4).contains(&value) {
                return Err(invalid_name(leaderboard, format!("quarter {value} out of range")));
            }
            let start = first_day(leaderboard, year, (value - 1) * 3 + 1)?;
            add_months(leaderboard, start, 6)
        }
        _ => {
            let monday = NaiveDate::from_isoywd_opt(year, value, Weekday::Mon)
                .ok_or_else(|| invalid_name(leaderboard, format!("week {value} out of range")))?;
            monday
                .checked_add_days(Days::new(14))
                .map(midnight)
                .ok_or_else(|| invalid_name(leaderboard, "date overflow".to_string()))
        }
    }
}

fn with_grace_period(leaderboard: &str, start: i64, end: i64) -> Result<i64, ExpirationError> {
    let duration = end - start;
    if duration <= 0 {
        return Err(ExpirationError::InvalidDuration {
            leaderboard: leaderboard.to_string(),
            seconds: duration,
        });
    }
    Ok(end + duration)
}

fn first_day(leaderboard: &str, year: i32, month: u32) -> Result<NaiveDate, ExpirationError> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| invalid_name(leaderboard, format!("month {month} out of range")))
}

fn add_months(leaderboard: &str, start: NaiveDate, months: u32) -> Result<i64, ExpirationError> {
    start
        .checked_add_months(Months::new(months))
        .map(midnight)
        .ok_or_else(|| invalid_name(leaderboard, "date overflow".to_string()))
}

fn parse_date(leaderboard: &str, value: &str) -> Result<i64, ExpirationError> {
    NaiveDate::parse_from_str(value, "%Y%m%d")
        .map(midnight)
        .map_err(|_| invalid_name(leaderboard, format!("{value} is not a date")))
}

fn parse_number<T: std::str::FromStr>(leaderboard: &str, value: &str) -> Result<T, ExpirationError> {
    value
        .parse()
        .map_err(|_| invalid_name(leaderboard, format!("{value} is not a number")))
}

fn midnight(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

fn invalid_name(leaderboard: &str, reason: String) -> ExpirationError {
    ExpirationError::InvalidName {
        leaderboard: leaderboard.to_string(),
        reason,
    }
}
