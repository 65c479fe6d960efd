use std::collections::HashMap;
use std::sync::Arc;

use gproxy_common::Provider;
use gproxy_provider_core::{DeviceFlowStart, DevicePollOutcome, OAuthStart, ProviderRegistry};
use gproxy_storage::{CredentialRecord, CredentialStore, PendingSession, SessionStore};
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::error::GatewayError;

/// Resolution of a previously-started OAuth handshake.
#[derive(Debug, Clone)]
pub enum OAuthStatus {
    Pending,
    Completed(Box<CredentialRecord>),
}

/// A session that has already completed, kept around just long enough
/// for one `get_oauth_status` poll to observe it after the pending
/// session itself was deleted. Bounded implicitly by
/// `sweep_expired_sessions`, which evicts entries older than the
/// session TTL.
struct CompletedOAuth {
    credential_id: String,
    at: OffsetDateTime,
}

/// Facade over the credential/session stores and the per-provider
/// handler registry. Every OAuth/device-code/service-account operation
/// the HTTP surface exposes goes through here; nothing else touches
/// `ProviderRegistry` directly.
pub struct AuthManager {
    store: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionStore>,
    registry: Arc<ProviderRegistry>,
    completed: RwLock<HashMap<String, CompletedOAuth>>,
}

impl AuthManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
        registry: Arc<ProviderRegistry>,
    ) -> Self {
        Self {
            store,
            sessions,
            registry,
            completed: RwLock::new(HashMap::new()),
        }
    }

    /// Exposes the backing store for the request pipeline's own
    /// credential-state transitions, which this facade's methods don't
    /// cover since those operate on the OAuth/device-code/SA lifecycle,
    /// not on routing outcomes.
    pub fn credential_store(&self) -> Arc<dyn CredentialStore> {
        self.store.clone()
    }

    pub async fn list_auth_files(&self) -> Result<Vec<CredentialRecord>, GatewayError> {
        Ok(self.store.list().await?)
    }

    pub async fn get_auth_files_by_provider(&self, provider: Provider) -> Result<Vec<CredentialRecord>, GatewayError> {
        Ok(self.store.list().await?.into_iter().filter(|r| r.provider == provider).collect())
    }

    pub async fn get_auth_file(&self, id: &str) -> Result<CredentialRecord, GatewayError> {
        Ok(self.store.get(id).await?)
    }

    pub async fn delete_auth_file(&self, id: &str) -> Result<(), GatewayError> {
        Ok(self.store.delete(id).await?)
    }

    pub async fn delete_by_provider(&self, provider: Provider) -> Result<u32, GatewayError> {
        let records = self.get_auth_files_by_provider(provider).await?;
        let mut deleted = 0u32;
        for record in records {
            self.store.delete(&record.id).await?;
            deleted += 1;
        }
        Ok(deleted)
    }

    /// Persists the PKCE/state session with a 10-minute expiry, returned
    /// to the caller as the authorize URL.
    pub async fn start_oauth(&self, provider: Provider) -> Result<OAuthStart, GatewayError> {
        let handler = self
            .registry
            .oauth(provider)
            .ok_or_else(|| GatewayError::Config(format!("{provider} has no oauth handler")))?;
        let start = handler.start_oauth().await?;
        self.sessions.save(&start.session).await?;
        Ok(start)
    }

    /// Validates the session (present, unexpired, provider match),
    /// exchanges the code, mints a credential, and always deletes the
    /// session afterward regardless of outcome.
    pub async fn handle_callback(
        &self,
        provider: Provider,
        code: &str,
        state: &str,
    ) -> Result<CredentialRecord, GatewayError> {
        let session = self
            .sessions
            .get(state)
            .await
            .map_err(|_| GatewayError::AuthSession("unknown oauth state".to_string()))?;

        let now = OffsetDateTime::now_utc();
        if session.is_expired(now) {
            self.sessions.delete(state).await.ok();
            return Err(GatewayError::AuthSession("oauth session expired".to_string()));
        }
        if session.provider != provider {
            self.sessions.delete(state).await.ok();
            return Err(GatewayError::AuthSession("oauth session provider mismatch".to_string()));
        }

        let handler = self
            .registry
            .oauth(provider)
            .ok_or_else(|| GatewayError::Config(format!("{provider} has no oauth handler")))?;

        let result = handler.handle_callback(&session, code).await;
        self.sessions.delete(state).await.ok();

        let record = result?;
        self.store.save(&record).await?;
        self.completed.write().await.insert(
            state.to_string(),
            CompletedOAuth { credential_id: record.id.clone(), at: now },
        );
        Ok(record)
    }

    pub async fn get_oauth_status(&self, state: &str) -> Result<OAuthStatus, GatewayError> {
        if self.sessions.get(state).await.is_ok() {
            return Ok(OAuthStatus::Pending);
        }
        let completed = self.completed.read().await;
        match completed.get(state) {
            Some(entry) => {
                let record = self.store.get(&entry.credential_id).await?;
                Ok(OAuthStatus::Completed(Box::new(record)))
            }
            None => Err(GatewayError::AuthSession("unknown or expired oauth state".to_string())),
        }
    }

    /// Device-code sessions are keyed by their own `device_code` (stored
    /// in `PendingSession::state`) rather than a separate random state
    /// value, since polling is addressed by `device_code` and
    /// `SessionStore` only indexes by one key.
    pub async fn start_device_flow(&self, provider: Provider) -> Result<DeviceFlowStart, GatewayError> {
        let handler = self
            .registry
            .device_code(provider)
            .ok_or_else(|| GatewayError::Config(format!("{provider} has no device-code handler")))?;
        let start = handler.start_device_flow().await?;
        self.sessions.save(&start.session).await?;
        Ok(start)
    }

    pub async fn poll_device_code(&self, provider: Provider, device_code: &str) -> Result<DevicePollOutcome, GatewayError> {
        let session = self
            .sessions
            .get(device_code)
            .await
            .map_err(|_| GatewayError::AuthSession("unknown device code".to_string()))?;

        let handler = self
            .registry
            .device_code(provider)
            .ok_or_else(|| GatewayError::Config(format!("{provider} has no device-code handler")))?;

        let outcome = handler.poll_for_token(&session).await?;
        match &outcome {
            DevicePollOutcome::Pending => {}
            DevicePollOutcome::Completed(record) => {
                self.sessions.delete(device_code).await.ok();
                self.store.save(record).await?;
            }
            DevicePollOutcome::Expired | DevicePollOutcome::Error(_) => {
                self.sessions.delete(device_code).await.ok();
            }
        }
        Ok(outcome)
    }

    pub async fn import_service_account(&self, provider: Provider, json: serde_json::Value) -> Result<CredentialRecord, GatewayError> {
        let handler = self
            .registry
            .service_account(provider)
            .ok_or_else(|| GatewayError::Config(format!("{provider} has no service-account handler")))?;
        let record = handler.import_service_account(json).await?;
        self.store.save(&record).await?;
        Ok(record)
    }

    /// A record with no expiry, or one still valid for at least 5 more
    /// minutes, is returned unchanged.
    pub async fn refresh_if_needed(&self, record: CredentialRecord) -> Result<CredentialRecord, GatewayError> {
        let Some(expires_at) = record.expires_at else {
            return Ok(record);
        };
        if expires_at > OffsetDateTime::now_utc() + time::Duration::minutes(5) {
            return Ok(record);
        }

        let refreshed = self.refresh(&record).await;
        match refreshed {
            Ok(updated) => {
                self.store.save(&updated).await?;
                Ok(updated)
            }
            Err(err) => {
                let mut failed = record.clone();
                failed.status = gproxy_storage::CredentialStatus::Error;
                failed.status_message = Some(err.to_string());
                failed.updated_at = OffsetDateTime::now_utc();
                self.store.save(&failed).await?;
                Err(err.into())
            }
        }
    }

    async fn refresh(&self, record: &CredentialRecord) -> gproxy_provider_core::ProviderResult<CredentialRecord> {
        if let Some(handler) = self.registry.oauth(record.provider) {
            return handler.refresh_token(record).await;
        }
        if let Some(handler) = self.registry.device_code(record.provider) {
            return handler.refresh_token(record).await;
        }
        if let Some(handler) = self.registry.service_account(record.provider) {
            return handler.refresh_token(record).await;
        }
        Err(gproxy_provider_core::ProviderError::Unsupported("no handler registered for this provider"))
    }

    /// The first enabled, non-error record for `provider`, refreshed if
    /// needed.
    pub async fn get_valid_credential(&self, provider: Provider) -> Result<Option<CredentialRecord>, GatewayError> {
        let candidate = self
            .store
            .list()
            .await?
            .into_iter()
            .find(|r| r.provider == provider && !r.disabled && r.status != gproxy_storage::CredentialStatus::Error);

        match candidate {
            Some(record) => Ok(Some(self.refresh_if_needed(record).await?)),
            None => Ok(None),
        }
    }

    /// Called periodically by the session sweeper task.
    pub async fn sweep_expired_sessions(&self) -> Result<u32, GatewayError> {
        let now = OffsetDateTime::now_utc();
        let sessions = self.sessions.list().await?;
        let mut removed = 0u32;
        for session in sessions {
            if session.is_expired(now) {
                self.sessions.delete(&session.state).await.ok();
                removed += 1;
            }
        }
        self.completed.write().await.retain(|_, entry| {
            entry.at + time::Duration::seconds(PendingSession::DEFAULT_TTL_SECS) > now
        });
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gproxy_storage::{FsCredentialStore, FsSessionStore};

    fn registry() -> Arc<ProviderRegistry> {
        let mut registry = ProviderRegistry::new();
        gproxy_providers::register_all(&mut registry, reqwest::Client::new());
        Arc::new(registry)
    }

    #[tokio::test]
    async fn oauth_status_is_unknown_before_any_start() {
        let dir = tempfile::tempdir().unwrap();
        let manager = AuthManager::new(
            Arc::new(FsCredentialStore::new(dir.path().join("auth"))),
            Arc::new(FsSessionStore::new(dir.path())),
            registry(),
        );
        assert!(manager.get_oauth_status("nope").await.is_err());
    }

    #[tokio::test]
    async fn start_oauth_persists_a_pending_session() {
        let dir = tempfile::tempdir().unwrap();
        let manager = AuthManager::new(
            Arc::new(FsCredentialStore::new(dir.path().join("auth"))),
            Arc::new(FsSessionStore::new(dir.path())),
            registry(),
        );
        let start = manager.start_oauth(Provider::Claude).await.unwrap();
        let status = manager.get_oauth_status(&start.session.state).await.unwrap();
        assert!(matches!(status, OAuthStatus::Pending));
    }

    #[tokio::test]
    async fn refresh_if_needed_is_a_noop_far_from_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let manager = AuthManager::new(
            Arc::new(FsCredentialStore::new(dir.path().join("auth"))),
            Arc::new(FsSessionStore::new(dir.path())),
            registry(),
        );
        let now = OffsetDateTime::now_utc();
        let record = CredentialRecord {
            schema_version: 1,
            id: "a".to_string(),
            provider: Provider::Claude,
            access_token: "tok".to_string(),
            refresh_token: None,
            expires_at: Some(now + time::Duration::hours(1)),
            email: None,
            name: None,
            project_id: None,
            region: None,
            tier: gproxy_common::Tier::Unknown,
            status: gproxy_storage::CredentialStatus::Ready,
            status_message: None,
            disabled: false,
            cooldown_until: None,
            cooldown_reason: None,
            quota_used: None,
            quota_limit: None,
            quota_reset_at: None,
            token_data: None,
            service_account_json: None,
            created_at: now,
            updated_at: now,
            extra: serde_json::Map::new(),
        };
        let returned = manager.refresh_if_needed(record.clone()).await.unwrap();
        assert_eq!(returned.access_token, record.access_token);
    }
}
