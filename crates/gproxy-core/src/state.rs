use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use gproxy_common::GatewayConfig;
use gproxy_provider_core::{ModelTierTable, ProviderRegistry, QuotaGroupTable};
use gproxy_routing::{FallbackEngine, Router};
use gproxy_storage::{CredentialStore, FsCredentialStore, FsSessionStore, SessionStore};
use tokio_util::sync::CancellationToken;

use crate::auth_manager::AuthManager;
use crate::error::GatewayError;
use crate::executor::Executor;
use crate::request_log::RequestLog;

/// Bound on the in-memory request log; there's no persistence engine
/// for it beyond the process lifetime, so this just caps memory use.
const REQUEST_LOG_CAPACITY: usize = 1000;

/// Process-wide handle to every shared service. Constructed once at
/// startup and passed by reference into every request handler; nothing
/// here is reached through ambient globals.
pub struct AppState {
    pub config: ArcSwap<GatewayConfig>,
    pub auth_manager: Arc<AuthManager>,
    pub router: Arc<Router>,
    pub fallback: Arc<FallbackEngine>,
    pub executor: Arc<Executor>,
    pub request_log: RequestLog,
    pub cancel: CancellationToken,
}

impl AppState {
    pub async fn bootstrap(config: GatewayConfig) -> Result<Arc<Self>, GatewayError> {
        let auth_dir = resolve_home(&config.auth_dir);
        let config_dir = resolve_home(&config.config_dir);

        let credential_store: Arc<dyn CredentialStore> = Arc::new(FsCredentialStore::new(&auth_dir));
        let session_store: Arc<dyn SessionStore> = Arc::new(FsSessionStore::new(&config_dir));

        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| GatewayError::Config(err.to_string()))?;

        let mut registry = ProviderRegistry::new();
        gproxy_providers::register_all(&mut registry, client.clone());

        let auth_manager = Arc::new(AuthManager::new(credential_store, session_store, Arc::new(registry)));
        let router = Arc::new(Router::new(ModelTierTable::default_table()));

        let fallback_path = Path::new(&config_dir).join("fallback.json");
        let fallback_config = FallbackEngine::load_config(&fallback_path)
            .await
            .map_err(|err| GatewayError::Config(err.to_string()))?;
        let fallback = Arc::new(FallbackEngine::new(fallback_config, fallback_path, QuotaGroupTable::default_table()));

        let executor = Arc::new(Executor::new(client));

        Ok(Arc::new(Self {
            config: ArcSwap::from_pointee(config),
            auth_manager,
            router,
            fallback,
            executor,
            request_log: RequestLog::new(REQUEST_LOG_CAPACITY),
            cancel: CancellationToken::new(),
        }))
    }

    /// An optional periodic quota refresher (one task, 5-minute cadence)
    /// and a session sweeper. Both stop on the shared cancellation
    /// token, which `shutdown` triggers.
    pub fn spawn_background_tasks(self: &Arc<Self>) {
        let state = self.clone();
        tokio::spawn(async move { state.run_session_sweeper().await });

        let state = self.clone();
        tokio::spawn(async move { state.run_quota_refresher().await });
    }

    async fn run_session_sweeper(&self) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.auth_manager.sweep_expired_sessions().await {
                        Ok(removed) if removed > 0 => tracing::debug!(removed, "swept expired oauth sessions"),
                        Ok(_) => {}
                        Err(err) => tracing::warn!(error = %err, "session sweep failed"),
                    }
                }
                _ = self.cancel.cancelled() => return,
            }
        }
    }

    async fn run_quota_refresher(&self) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    for provider in gproxy_common::Provider::ALL {
                        if let Err(err) = self.auth_manager.get_valid_credential(provider).await {
                            tracing::debug!(%provider, error = %err, "quota refresher skipped provider");
                        }
                    }
                }
                _ = self.cancel.cancelled() => return,
            }
        }
    }

    /// Triggers graceful drain on `SIGTERM`/`SIGINT`: background tasks
    /// observe the cancellation token and stop; in-flight requests are
    /// allowed to complete by whoever owns the listener.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Resolves a leading `~` against `HOME`, the only path-expansion rule
/// supported.
fn resolve_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{home}/{rest}");
        }
    }
    path.to_string()
}
