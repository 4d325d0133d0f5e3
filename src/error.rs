use crate::engine::SimError;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// A simulation rule rejected the request.
    #[error("{0}")]
    Rejected(#[from] SimError),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::Rejected(SimError::InvalidInput(_)) => "invalid_input",
            AppError::Rejected(SimError::InsufficientBalance { .. }) => "insufficient_balance",
            AppError::Rejected(SimError::PoolExhausted { .. }) => "pool_exhausted",
            AppError::Rejected(SimError::PersistenceUnavailable(_)) => "persistence_unavailable",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Rejected(SimError::PersistenceUnavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Rejected(_) => StatusCode::BAD_REQUEST,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Decimal, Token};

    #[test]
    fn test_sim_errors_are_bad_requests() {
        let err = AppError::from(SimError::InsufficientBalance {
            token: Token::Ifx,
            requested: Decimal::from_i64(2),
            available: Decimal::from_i64(1),
        });
        assert_eq!(err.code(), "insufficient_balance");
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_persistence_failure_is_503() {
        let err = AppError::from(SimError::PersistenceUnavailable("disk full".to_string()));
        assert_eq!(err.code(), "persistence_unavailable");
        assert_eq!(
            err.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_bad_request_code() {
        let err = AppError::BadRequest("amount: invalid decimal x".to_string());
        assert_eq!(err.code(), "bad_request");
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
