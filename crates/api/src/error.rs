use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use leaderboard::{InvalidOrder, ServiceError};
use shared::api::ErrorResponse;

#[derive(Debug)]
pub enum AppError {
    /// Leaderboard failures. Misses and bad arguments are shown to the
    /// caller, anything else returns a generic 500.
    Service(ServiceError),
    /// Validation errors - safe to show
    Validation(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Service(ServiceError::MemberNotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Service(
                ServiceError::InvalidOrder(_)
                | ServiceError::Percentage(_)
                | ServiceError::InvalidScoreTtl(_)
                | ServiceError::LeaderboardExpired(_),
            ) => StatusCode::BAD_REQUEST,
            AppError::Service(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let reason = match self {
            AppError::Service(err) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %err, "internal error");
                sentry::capture_error(&err);

                "Internal server error".to_string()
            }
            AppError::Service(err) => err.to_string(),
            AppError::Validation(msg) => msg,
        };

        let body = ErrorResponse {
            success: false,
            reason,
        };
        (status, Json(body)).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        Self::Service(err)
    }
}

impl From<InvalidOrder> for AppError {
    fn from(err: InvalidOrder) -> Self {
        Self::Service(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn response_body(response: Response) -> ErrorResponse {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn general_error_returns_500_generic_message() {
        let err = AppError::Service(ServiceError::General {
            service: "get member",
            message: "connection refused to 10.0.0.3:6379".into(),
        });
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response_body(response).await;
        assert!(!body.success);
        assert_eq!(body.reason, "Internal server error");
    }

    #[tokio::test]
    async fn member_not_found_returns_404_with_reason() {
        let err = AppError::Service(ServiceError::MemberNotFound {
            leaderboard: "global".into(),
            member: "dayvson".into(),
        });
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response_body(response).await.reason,
            "could not find data for member dayvson in leaderboard global"
        );
    }

    #[tokio::test]
    async fn invalid_order_returns_400() {
        let err: AppError = InvalidOrder("sideways".into()).into();
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response_body(response).await.reason, "invalid order: sideways");
    }

    #[tokio::test]
    async fn caller_mistakes_return_400() {
        let expired = AppError::Service(ServiceError::LeaderboardExpired("year2020".into()));
        let percentage = AppError::Service(ServiceError::Percentage(101));
        let score_ttl = AppError::Service(ServiceError::InvalidScoreTtl("soon".into()));

        assert_eq!(expired.into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(percentage.into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(score_ttl.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn validation_error_returns_400_with_details() {
        let err = AppError::Validation("pageSize: max allowed is 2000".into());
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response_body(response).await.reason,
            "pageSize: max allowed is 2000"
        );
    }
}
