use std::sync::Arc;

use gproxy_core::{AppState, RequestPipeline};

/// Axum-visible handle to the process: the shared core state plus the
/// request pipeline built on top of it. Kept separate from `AppState`
/// itself so `gproxy-core` never depends on axum.
#[derive(Clone)]
pub struct GatewayState {
    pub app: Arc<AppState>,
    pub pipeline: Arc<RequestPipeline>,
}

impl GatewayState {
    pub fn new(app: Arc<AppState>) -> Self {
        let pipeline = Arc::new(RequestPipeline::new(app.clone()));
        Self { app, pipeline }
    }
}
