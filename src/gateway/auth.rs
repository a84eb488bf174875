use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use super::server::AppState;

/// Check an `Authorization` header value against the expected token.
/// Returns true if no token is required (loopback) or if the bearer token matches.
pub fn verify_bearer(header: Option<&str>, expected: &Option<String>) -> bool {
    let expected = match expected {
        Some(t) => t,
        None => return true,
    };

    match header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => constant_time_eq(token.trim().as_bytes(), expected.as_bytes()),
        None => false,
    }
}

/// Rejects requests without a valid bearer token.
pub async fn require_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if !verify_bearer(header, &state.token) {
        return (
            StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({ "error": "unauthorized" })),
        )
            .into_response();
    }

    next.run(request).await
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
