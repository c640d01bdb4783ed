//! Typed error responses for the HTTP boundary.
//!
//! The service layer's closed error set is mapped to status codes through
//! one exhaustive match; clients get a stable machine-readable code and a
//! human-readable message. Credential and custody failures deliberately
//! collapse to an opaque internal error.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::infra::MarketError;

/// Stable error codes for API responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    UserNotFound,
    EventNotFound,
    TicketNotFound,
    ListingNotFound,
    ListingNotActive,
    SoldOut,
    InvalidPrice,
    InvalidAddress,
    InvalidRequestBody,
    NotOwner,
    NotSeller,
    SelfTrade,
    InsufficientFunds,
    TransactionReverted,
    ConfirmationTimeout,
    ReconciliationRequired,
    ProviderUnavailable,
    DatabaseError,
    InternalError,
}

/// API error wrapper around the service taxonomy
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: ErrorCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: ErrorCode,
    message: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ErrorCode::InvalidRequestBody,
            message,
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": ErrorBody {
                code: self.code,
                message: &self.message,
            }
        }));
        (self.status, body).into_response()
    }
}

impl From<MarketError> for ApiError {
    fn from(err: MarketError) -> Self {
        let (status, code) = match &err {
            MarketError::UserNotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::UserNotFound),
            MarketError::EventNotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::EventNotFound),
            MarketError::TicketNotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::TicketNotFound),
            MarketError::ListingNotFound(_) => {
                (StatusCode::NOT_FOUND, ErrorCode::ListingNotFound)
            }
            MarketError::ListingNotActive(_) => {
                (StatusCode::CONFLICT, ErrorCode::ListingNotActive)
            }
            MarketError::SoldOut { .. } => (StatusCode::CONFLICT, ErrorCode::SoldOut),
            MarketError::InvalidPrice { .. } => (StatusCode::BAD_REQUEST, ErrorCode::InvalidPrice),
            MarketError::InvalidAddress(_) => {
                (StatusCode::BAD_REQUEST, ErrorCode::InvalidAddress)
            }
            MarketError::Validation(_) => {
                (StatusCode::BAD_REQUEST, ErrorCode::InvalidRequestBody)
            }
            MarketError::NotOwner { .. } => (StatusCode::FORBIDDEN, ErrorCode::NotOwner),
            MarketError::NotSeller { .. } => (StatusCode::FORBIDDEN, ErrorCode::NotSeller),
            MarketError::SelfTrade(_) => (StatusCode::BAD_REQUEST, ErrorCode::SelfTrade),
            MarketError::InsufficientFunds { .. } => {
                (StatusCode::PAYMENT_REQUIRED, ErrorCode::InsufficientFunds)
            }
            MarketError::TransactionReverted { .. } => {
                (StatusCode::CONFLICT, ErrorCode::TransactionReverted)
            }
            MarketError::ConfirmationTimeout { .. } => {
                (StatusCode::GATEWAY_TIMEOUT, ErrorCode::ConfirmationTimeout)
            }
            MarketError::TokenIdNotFound { .. } | MarketError::CacheDesync { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::ReconciliationRequired,
            ),
            // No cipher or key detail crosses this boundary.
            MarketError::CredentialsUnavailable
            | MarketError::AddressMismatch { .. }
            | MarketError::Encryption(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::InternalError,
            ),
            MarketError::Provider(_) => {
                (StatusCode::BAD_GATEWAY, ErrorCode::ProviderUnavailable)
            }
            MarketError::Database(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DatabaseError)
            }
            MarketError::Configuration(_) | MarketError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalError)
            }
        };

        let message = match code {
            ErrorCode::InternalError => "internal error".to_string(),
            _ => err.to_string(),
        };

        Self {
            status,
            code,
            message,
        }
    }
}
