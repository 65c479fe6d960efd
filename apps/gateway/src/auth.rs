use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use crate::state::GatewayState;

/// Downstream API-key check for inference routes. Accepted from, in
/// order: `Authorization: Bearer`, `x-api-key`, `x-goog-api-key`, or a
/// `?key=` query parameter, mirroring where each client-facing protocol
/// natively puts its credential. An empty `api_keys` list means the
/// operator hasn't configured downstream auth; every request passes.
pub async fn require_api_key(
    State(state): State<GatewayState>,
    req: axum::http::Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let api_keys = state.app.config.load_full().api_keys.clone();
    if api_keys.is_empty() {
        return Ok(next.run(req).await);
    }

    let key = extract_key(req.headers(), req.uri().query());
    match key {
        Some(key) if api_keys.iter().any(|k| k == &key) => Ok(next.run(req).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

fn extract_key(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    if let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }
    if let Some(value) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    if let Some(value) = headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) {
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    let query = query?;
    let parsed: std::collections::HashMap<String, String> = serde_urlencoded::from_str(query).ok()?;
    parsed.get("key").filter(|v| !v.is_empty()).cloned()
}

/// Management-route gate: requires `x-management-key` or a bearer token
/// matching `remote_management.secret_key`. An unconfigured secret locks
/// every management route out rather than defaulting open.
pub async fn require_management_key(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    req: axum::http::Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.app.config.load_full().remote_management.secret_key.clone() else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    let provided = headers
        .get("x-management-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::trim)
                .map(str::to_string)
        });

    match provided {
        Some(key) if key == expected => Ok(next.run(req).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}
