//! Ties credential storage, provider handlers, routing, and the
//! upstream executor into the process-wide state a request handler
//! operates against.

mod auth_manager;
mod error;
mod executor;
mod pipeline;
pub mod request_log;
mod state;
mod upstream;

pub use auth_manager::{AuthManager, OAuthStatus};
pub use error::GatewayError;
pub use executor::{Executor, ExecutorRequest, Outcome, ResponseBody, RetryPolicy, UpstreamResponse};
pub use pipeline::{detect_provider_from_model, InferenceCall, InferenceResult, RequestPipeline};
pub use request_log::{RequestLog, RequestLogEntry, RequestStats};
pub use state::AppState;
pub use upstream::{build_headers, build_url, endpoint_for, UpstreamEndpoint};
