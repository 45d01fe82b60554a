//! API error types with HTTP response mapping.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use saga::CommitError;
use serde::Serialize;

static EXPOSE_DETAIL: AtomicBool = AtomicBool::new(false);

/// Controls whether server errors carry their underlying cause in the
/// response body. Off in production.
pub fn expose_error_detail(expose: bool) {
    EXPOSE_DETAIL.store(expose, Ordering::Relaxed);
}

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed or missing request data.
    Validation(String),
    /// Resource not found.
    NotFound(String),
    /// Commit, cancellation or lookup failure from the order core.
    Commit(CommitError),
    /// Internal server error.
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl ApiError {
    /// HTTP status and stable error code.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "ValidationError"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFoundError"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ServerError"),
            ApiError::Commit(err) => match err {
                CommitError::Validation(_) | CommitError::ProductInactive { .. } => {
                    (StatusCode::BAD_REQUEST, "ValidationError")
                }
                CommitError::InvalidItem(_) => (StatusCode::BAD_REQUEST, "InvalidItem"),
                CommitError::ProductNotFound(_) | CommitError::CustomerNotFound(_) => {
                    (StatusCode::BAD_REQUEST, "NotFoundError")
                }
                CommitError::InsufficientStock { .. } => {
                    (StatusCode::BAD_REQUEST, "InsufficientStockError")
                }
                CommitError::DuplicateOrderNumber(_) => {
                    (StatusCode::BAD_REQUEST, "DuplicateOrderNumberError")
                }
                CommitError::InvalidId(_) => (StatusCode::BAD_REQUEST, "InvalidIdError"),
                CommitError::Unauthenticated => (StatusCode::UNAUTHORIZED, "AuthenticationError"),
                CommitError::OrderNotFound(_) => (StatusCode::NOT_FOUND, "NotFoundError"),
                CommitError::InvalidTransition { .. } => {
                    (StatusCode::CONFLICT, "InvalidTransitionError")
                }
                CommitError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ServerError"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let body = if status.is_server_error() {
            let detail = match &self {
                ApiError::Commit(err) => err.to_string(),
                ApiError::Internal(msg) => msg.clone(),
                ApiError::Validation(msg) | ApiError::NotFound(msg) => msg.clone(),
            };
            tracing::error!(error = %detail, "internal server error");
            ErrorBody {
                error: "Internal server error".to_string(),
                code,
                detail: EXPOSE_DETAIL.load(Ordering::Relaxed).then_some(detail),
            }
        } else {
            let message = match self {
                ApiError::Commit(err) => err.to_string(),
                ApiError::Validation(msg) | ApiError::NotFound(msg) | ApiError::Internal(msg) => {
                    msg
                }
            };
            ErrorBody {
                error: message,
                code,
                detail: None,
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<CommitError> for ApiError {
    fn from(err: CommitError) -> Self {
        ApiError::Commit(err)
    }
}

impl From<store::StoreError> for ApiError {
    fn from(err: store::StoreError) -> Self {
        ApiError::Commit(CommitError::Store(err))
    }
}

impl From<common::IdParseError> for ApiError {
    fn from(err: common::IdParseError) -> Self {
        ApiError::Commit(CommitError::InvalidId(err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use common::{OrderId, ProductId};
    use domain::OrderStatus;
    use store::StoreError;

    use super::*;

    #[test]
    fn commit_errors_map_to_status_codes() {
        let cases = [
            (CommitError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (
                CommitError::ProductNotFound(ProductId::new()),
                StatusCode::BAD_REQUEST,
            ),
            (
                CommitError::OrderNotFound(OrderId::new()),
                StatusCode::NOT_FOUND,
            ),
            (
                CommitError::InvalidTransition {
                    from: OrderStatus::Cancelled,
                    to: OrderStatus::Completed,
                },
                StatusCode::CONFLICT,
            ),
            (
                CommitError::Store(StoreError::Unavailable("down".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status_and_code().0, expected);
        }
    }

    #[test]
    fn insufficient_stock_has_stable_code() {
        let err = ApiError::from(CommitError::InsufficientStock {
            product_id: ProductId::new(),
            product_name: "Rice".to_string(),
            requested: 3,
            available: 1,
        });
        assert_eq!(
            err.status_and_code(),
            (StatusCode::BAD_REQUEST, "InsufficientStockError")
        );
    }
}
