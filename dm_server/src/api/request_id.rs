//! Request ID and request metrics middleware.
//!
//! Every request gets an `x-request-id` (reused from the client when
//! present) that is echoed on the response and attached to the request's
//! log lines. Request counts and durations are recorded on completion.

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::metrics;

/// Header name for request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest client-supplied request ID that is reused as is
const MAX_REQUEST_ID_LEN: usize = 128;

/// Request ID stored in request extensions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Reuse the client's request ID if it is sane, otherwise generate one
fn get_or_generate_request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Tag the request with an ID, log it, and record request metrics
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = get_or_generate_request_id(request.headers());
    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let method = request.method().clone();
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        uri = %request.uri(),
    );

    let started = Instant::now();
    let mut response = next.run(request).instrument(span.clone()).await;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    }

    let status = response.status();
    metrics::http_requests_total(method.as_str(), status.as_u16());
    metrics::http_request_duration_ms(method.as_str(), elapsed_ms);

    span.in_scope(|| {
        if status.is_server_error() {
            tracing::warn!(status = %status, elapsed_ms, "Request failed");
        } else {
            tracing::info!(status = %status, elapsed_ms, "Request completed");
        }
    });

    response
}
