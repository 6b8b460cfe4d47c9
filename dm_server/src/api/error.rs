//! Mapping from domain errors to HTTP responses.
//!
//! Every domain error carries a stable `code()` and a sanitized
//! `client_message()`. The code picks the status; the body is
//! `{"error": code, "message": client_message}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use dress_market::accounts::AccountError;
use dress_market::identity::AuthError;
use dress_market::inventory::InventoryError;
use dress_market::ledger::LedgerError;
use dress_market::orders::OrderError;
use serde::Serialize;

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
}

/// Error returned by API handlers
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    /// Build an error from a stable code, choosing the status from it
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: status_for(code),
            code,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("forbidden", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }
}

/// HTTP status for a domain error code
pub fn status_for(code: &str) -> StatusCode {
    match code {
        "validation_error" => StatusCode::BAD_REQUEST,
        "missing_token" | "invalid_token" | "token_expired" => StatusCode::UNAUTHORIZED,
        "insufficient_funds" => StatusCode::PAYMENT_REQUIRED,
        "forbidden" | "not_participant" => StatusCode::FORBIDDEN,
        "not_found" => StatusCode::NOT_FOUND,
        "item_not_available" | "order_already_closed" | "invalid_transition" | "conflict" => {
            StatusCode::CONFLICT
        }
        "invalid_party" => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

macro_rules! impl_from_domain_error {
    ($($error:ty),* $(,)?) => {
        $(
            impl From<$error> for ApiError {
                fn from(err: $error) -> Self {
                    let api_error = ApiError::new(err.code(), err.client_message());
                    if api_error.status.is_server_error() {
                        tracing::error!(error = %err, code = err.code(), "Request failed");
                    }
                    api_error
                }
            }
        )*
    };
}

impl_from_domain_error!(OrderError, AccountError, InventoryError, LedgerError, AuthError);

#[cfg(test)]
mod tests {
    use super::*;
    use dress_market::orders::OrderStatus;

    #[test]
    fn test_insufficient_funds_maps_to_payment_required() {
        let err: ApiError = OrderError::from(LedgerError::InsufficientFunds {
            available: 5000,
            required: 6000,
        })
        .into();
        assert_eq!(err.status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(err.code, "insufficient_funds");
    }

    #[test]
    fn test_transition_errors_map_to_conflict() {
        let closed: ApiError = OrderError::OrderAlreadyClosed(7).into();
        assert_eq!(closed.status, StatusCode::CONFLICT);

        let invalid: ApiError = OrderError::InvalidTransition {
            from: OrderStatus::Shipped,
            to: OrderStatus::ActiveRental,
        }
        .into();
        assert_eq!(invalid.status, StatusCode::CONFLICT);
        assert_eq!(invalid.code, "invalid_transition");
    }

    #[test]
    fn test_invariant_violation_is_sanitized() {
        let err: ApiError = OrderError::from(LedgerError::EscrowUnderflow {
            held: 10,
            required: 20,
        })
        .into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Internal server error");
    }

    #[test]
    fn test_auth_errors_are_unauthorized() {
        let err: ApiError = AuthError::Expired.into();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.code, "token_expired");
    }
}
