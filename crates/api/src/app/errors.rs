//! Error mapping: every failure leaves the API as a status code plus a
//! plain-text reason.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use storedesk_auth::AuthzError;
use storedesk_core::DomainError;
use storedesk_infra::{LifecycleError, PaymentError, RepositoryError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("unauthenticated")]
    Unauthorized,

    /// Store missing or owned by someone else.
    #[error("{0}")]
    NotStoreOwner(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotStoreOwner(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Internal(detail) => {
                error!(%detail, "request failed");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        (status, body).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => ApiError::BadRequest(msg),
            DomainError::InvariantViolation(msg) | DomainError::Conflict(msg) => ApiError::Conflict(msg),
            DomainError::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            DomainError::Unauthorized => ApiError::Unauthorized,
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            RepositoryError::Conflict(msg) => ApiError::Conflict(msg),
            RepositoryError::Domain(e) => e.into(),
            other @ (RepositoryError::Database { .. } | RepositoryError::Corrupt(_)) => {
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::OrderNotFound(id) => ApiError::NotFound(format!("order {id} not found")),
            LifecycleError::Domain(e) => e.into(),
            LifecycleError::Repository(e) => e.into(),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Malformed(_) | PaymentError::MissingOrderId(_) => {
                ApiError::BadRequest(err.to_string())
            }
            PaymentError::Gateway(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        ApiError::NotStoreOwner(err.to_string())
    }
}
