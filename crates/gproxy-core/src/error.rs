use gproxy_provider_core::ProviderError;
use gproxy_storage::StorageError;
use gproxy_transform::TranslationError;

/// The single error type the HTTP surface renders. Every leaf crate's
/// error converts into one of these via `From`, so `?` composes across
/// crate boundaries without ad hoc string errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("malformed configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("auth session error: {0}")]
    AuthSession(String),

    #[error("provider auth error: {0}")]
    ProviderAuth(String),

    #[error("upstream retryable failure: {0}")]
    UpstreamRetryable(String),

    #[error("upstream quota exceeded: {0}")]
    UpstreamQuota(String),

    #[error("upstream client error ({status}): {0}", status = .0)]
    UpstreamClient(u16, String),

    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error("upstream proxy unavailable: {0}")]
    PassthroughUnavailable(String),

    #[error("no eligible credential or fallback entry for this request")]
    NoEligibleRoute,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<ProviderError> for GatewayError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Session(msg) => GatewayError::AuthSession(msg),
            other => GatewayError::ProviderAuth(other.to_string()),
        }
    }
}

impl From<gproxy_routing::RoutingError> for GatewayError {
    fn from(err: gproxy_routing::RoutingError) -> Self {
        match err {
            gproxy_routing::RoutingError::UnknownVirtualModel(name) => GatewayError::NotFound(name),
            gproxy_routing::RoutingError::NoEligibleCandidates => GatewayError::NoEligibleRoute,
            gproxy_routing::RoutingError::Storage(msg) => GatewayError::Config(msg),
        }
    }
}

impl GatewayError {
    /// HTTP status rendered by the HTTP surface.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Config(_) => 500,
            GatewayError::Storage(_) => 500,
            GatewayError::AuthSession(_) => 400,
            GatewayError::ProviderAuth(_) => 400,
            GatewayError::UpstreamRetryable(_) => 502,
            GatewayError::UpstreamQuota(_) => 429,
            GatewayError::UpstreamClient(status, _) => *status,
            GatewayError::Translation(_) => 502,
            GatewayError::PassthroughUnavailable(_) => 503,
            GatewayError::NoEligibleRoute => 503,
            GatewayError::NotFound(_) => 404,
            GatewayError::BadRequest(_) => 400,
        }
    }

    /// Stable `error.type` discriminator for the JSON error body. Never
    /// leaks internal details (file paths, stack traces); only
    /// `.to_string()` goes in the `message` field, and the `Display`
    /// impls above are all written to be safe for that.
    pub fn error_type(&self) -> &'static str {
        match self {
            GatewayError::Config(_) => "config_error",
            GatewayError::Storage(_) => "storage_error",
            GatewayError::AuthSession(_) => "auth_session_error",
            GatewayError::ProviderAuth(_) => "provider_auth_error",
            GatewayError::UpstreamRetryable(_) => "upstream_retryable",
            GatewayError::UpstreamQuota(_) => "upstream_quota",
            GatewayError::UpstreamClient(_, _) => "upstream_client_error",
            GatewayError::Translation(_) => "translation_error",
            GatewayError::PassthroughUnavailable(_) => "passthrough_unavailable",
            GatewayError::NoEligibleRoute => "no_eligible_route",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::BadRequest(_) => "bad_request",
        }
    }
}
