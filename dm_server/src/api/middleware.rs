//! Authentication middleware for protected endpoints.
//!
//! Buyer and seller routes carry `Authorization: Bearer <token>`; the token
//! is resolved through the configured [`IdentityProvider`] and the resulting
//! [`UserIdentity`] is injected into request extensions.
//!
//! Support routes carry the shared key in `x-support-key` instead.
//!
//! # Extracting the caller
//!
//! ```rust,no_run
//! use axum::extract::Extension;
//! use dress_market::identity::UserIdentity;
//!
//! async fn protected_handler(Extension(identity): Extension<UserIdentity>) -> String {
//!     format!("Authenticated as user {}", identity.user_id)
//! }
//! # let _ = protected_handler;
//! ```
//!
//! [`IdentityProvider`]: dress_market::identity::IdentityProvider
//! [`UserIdentity`]: dress_market::identity::UserIdentity

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use dress_market::identity::AuthError;
use subtle::ConstantTimeEq;

use super::{AppState, error::ApiError};
use crate::logging::log_security_event;

/// Header carrying the support key
pub const SUPPORT_KEY_HEADER: &str = "x-support-key";

/// Resolve the bearer token and inject the caller's identity.
///
/// - **Success**: injects `UserIdentity` → calls next handler
/// - **Missing header or wrong scheme**: `401` with `missing_token`
/// - **Invalid/expired token**: `401` with `invalid_token` / `token_expired`
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingToken)?;

    let resolved = state.identity.current_user(token.trim()).await;
    match resolved {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            Ok(next.run(request).await)
        }
        Err(err) => {
            log_security_event(err.code(), None, &err.to_string());
            Err(err.into())
        }
    }
}

/// Reject requests that do not carry the support key.
pub async fn support_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = request
        .headers()
        .get(SUPPORT_KEY_HEADER)
        .map(|value| value.as_bytes())
        .unwrap_or_default();

    if bool::from(presented.ct_eq(state.support_api_key.as_bytes())) {
        Ok(next.run(request).await)
    } else {
        log_security_event("invalid_support_key", None, "Support endpoint called without a valid key");
        Err(ApiError::forbidden("Support key required"))
    }
}
