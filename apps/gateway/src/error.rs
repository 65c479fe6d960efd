use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gproxy_core::GatewayError;

/// Wraps `GatewayError` so the HTTP surface can give it an `IntoResponse`
/// impl without `gproxy-core` depending on axum.
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(serde_json::json!({
            "error": {
                "type": self.0.error_type(),
                "message": self.0.to_string(),
            }
        }));
        (status, body).into_response()
    }
}
