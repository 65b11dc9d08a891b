use std::fmt::Display;

use crate::model::InvalidOrder;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Any store or calculator failure not classified below, tagged with the
    /// operation that hit it.
    #[error("error on service {service}: {message}")]
    General {
        service: &'static str,
        message: String,
    },

    #[error("could not find data for member {member} in leaderboard {leaderboard}")]
    MemberNotFound { leaderboard: String, member: String },

    #[error("page {page} out of range (1, {total_pages})")]
    PageOutOfRange { page: i64, total_pages: i64 },

    #[error("leaderboard {0} has expired")]
    LeaderboardExpired(String),

    #[error("percentage {0} must be an integer between 1 and 100")]
    Percentage(i64),

    #[error("invalid score ttl {0}")]
    InvalidScoreTtl(String),

    #[error(transparent)]
    InvalidOrder(#[from] InvalidOrder),
}

impl ServiceError {
    pub(crate) fn general(service: &'static str, err: impl Display) -> Self {
        ServiceError::General {
            service,
            message: err.to_string(),
        }
    }

    pub(crate) fn member_not_found(leaderboard: &str, member: &str) -> Self {
        ServiceError::MemberNotFound {
            leaderboard: leaderboard.to_string(),
            member: member.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_error_carries_service_label() {
        let err = ServiceError::general("get around me", "connection refused");

        assert_eq!(
            err.to_string(),
            "error on service get around me: connection refused"
        );
    }

    #[test]
    fn member_not_found_names_member_and_leaderboard() {
        let err = ServiceError::member_not_found("global", "dayvson");

        assert_eq!(
            err.to_string(),
            "could not find data for member dayvson in leaderboard global"
        );
    }
}
