use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::atomic::{atomic_write_json, read_json_dir_sorted, sanitize_id};
use crate::credential::CredentialRecord;
use crate::error::StorageError;
use crate::session::PendingSession;

/// Durable credential storage contract. Every method takes the id/state
/// as given by the caller; sanitization is an implementation detail of
/// the filesystem backend.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn list(&self) -> Result<Vec<CredentialRecord>, StorageError>;
    async fn get(&self, id: &str) -> Result<CredentialRecord, StorageError>;
    async fn save(&self, record: &CredentialRecord) -> Result<(), StorageError>;
    async fn delete(&self, id: &str) -> Result<(), StorageError>;
}

#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, state: &str) -> Result<PendingSession, StorageError>;
    async fn save(&self, session: &PendingSession) -> Result<(), StorageError>;
    async fn delete(&self, state: &str) -> Result<(), StorageError>;
    /// Every pending session on disk, for the sweeper that removes
    /// expired ones.
    async fn list(&self) -> Result<Vec<PendingSession>, StorageError>;
}

/// Filesystem-backed `CredentialStore`: one `{sanitize_id(id)}.json` per
/// record under `auth_dir`, written with temp-then-rename.
pub struct FsCredentialStore {
    auth_dir: PathBuf,
}

impl FsCredentialStore {
    pub fn new(auth_dir: impl Into<PathBuf>) -> Self {
        Self {
            auth_dir: auth_dir.into(),
        }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.auth_dir.join(format!("{}.json", sanitize_id(id)))
    }
}

#[async_trait::async_trait]
impl CredentialStore for FsCredentialStore {
    async fn list(&self) -> Result<Vec<CredentialRecord>, StorageError> {
        read_json_dir_sorted(&self.auth_dir, |r: &CredentialRecord| r.updated_at).await
    }

    async fn get(&self, id: &str) -> Result<CredentialRecord, StorageError> {
        let path = self.path_for(id);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|_| StorageError::NotFound(id.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn save(&self, record: &CredentialRecord) -> Result<(), StorageError> {
        atomic_write_json(&self.path_for(&record.id), record).await
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let path = self.path_for(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Filesystem-backed `SessionStore`, mirrored by an in-memory map for
/// fast lookup during the handshake: sessions are short-lived and read
/// far more often than written, so the cache avoids a disk round trip
/// on every poll.
pub struct FsSessionStore {
    sessions_dir: PathBuf,
    cache: Arc<RwLock<std::collections::HashMap<String, PendingSession>>>,
}

impl FsSessionStore {
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            sessions_dir: config_dir.as_ref().join("sessions"),
            cache: Arc::new(RwLock::new(std::collections::HashMap::new())),
        }
    }

    fn path_for(&self, state: &str) -> PathBuf {
        self.sessions_dir.join(format!("{}.json", sanitize_id(state)))
    }
}

#[async_trait::async_trait]
impl SessionStore for FsSessionStore {
    async fn get(&self, state: &str) -> Result<PendingSession, StorageError> {
        if let Some(session) = self.cache.read().await.get(state).cloned() {
            return Ok(session);
        }
        let path = self.path_for(state);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|_| StorageError::NotFound(state.to_string()))?;
        let session: PendingSession = serde_json::from_slice(&bytes)?;
        self.cache
            .write()
            .await
            .insert(state.to_string(), session.clone());
        Ok(session)
    }

    async fn save(&self, session: &PendingSession) -> Result<(), StorageError> {
        atomic_write_json(&self.path_for(&session.state), session).await?;
        self.cache
            .write()
            .await
            .insert(session.state.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, state: &str) -> Result<(), StorageError> {
        self.cache.write().await.remove(state);
        let path = self.path_for(state);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn list(&self) -> Result<Vec<PendingSession>, StorageError> {
        read_json_dir_sorted(&self.sessions_dir, |s: &PendingSession| s.created_at).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialStatus;
    use gproxy_common::{Provider, Tier};
    use time::OffsetDateTime;

    fn sample_record(id: &str) -> CredentialRecord {
        let now = OffsetDateTime::now_utc();
        CredentialRecord {
            schema_version: gproxy_common::SCHEMA_VERSION,
            id: id.to_string(),
            provider: Provider::Claude,
            access_token: "at".to_string(),
            refresh_token: Some("rt".to_string()),
            expires_at: None,
            email: None,
            name: None,
            project_id: None,
            region: None,
            tier: Tier::Paid,
            status: CredentialStatus::Ready,
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
        }
    }

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCredentialStore::new(dir.path());
        let record = sample_record("cred-1");
        store.save(&record).await.unwrap();
        let loaded = store.get("cred-1").await.unwrap();
        assert_eq!(loaded.id, "cred-1");
        assert_eq!(loaded.access_token, "at");
    }

    #[tokio::test]
    async fn list_is_sorted_by_updated_at_descending() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCredentialStore::new(dir.path());

        let mut older = sample_record("older");
        older.updated_at = OffsetDateTime::now_utc() - time::Duration::minutes(5);
        let newer = sample_record("newer");

        store.save(&older).await.unwrap();
        store.save(&newer).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "newer");
        assert_eq!(listed[1].id, "older");
    }

    #[tokio::test]
    async fn corrupt_record_is_skipped_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCredentialStore::new(dir.path());

        let good = sample_record("good");
        store.save(&good).await.unwrap();
        tokio::fs::write(dir.path().join("bad.json"), b"not json")
            .await
            .unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "good");

        let raw = tokio::fs::read_to_string(dir.path().join("bad.json"))
            .await
            .unwrap();
        assert_eq!(raw, "not json");
    }

    #[tokio::test]
    async fn get_missing_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCredentialStore::new(dir.path());
        let err = store.get("nope").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_removes_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCredentialStore::new(dir.path());
        store.save(&sample_record("gone")).await.unwrap();
        store.delete("gone").await.unwrap();
        assert!(matches!(
            store.get("gone").await.unwrap_err(),
            StorageError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn session_save_get_delete_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSessionStore::new(dir.path());
        let now = OffsetDateTime::now_utc();
        let session = PendingSession {
            state: "state-123".to_string(),
            provider: Provider::GeminiCli,
            code_verifier: Some("verifier".to_string()),
            redirect_uri: Some("http://localhost/callback".to_string()),
            device_code: None,
            user_code: None,
            verification_uri: None,
            poll_interval: None,
            created_at: now,
            expires_at: now + time::Duration::seconds(PendingSession::DEFAULT_TTL_SECS),
        };
        store.save(&session).await.unwrap();
        let loaded = store.get("state-123").await.unwrap();
        assert_eq!(loaded.code_verifier.as_deref(), Some("verifier"));

        store.delete("state-123").await.unwrap();
        assert!(matches!(
            store.get("state-123").await.unwrap_err(),
            StorageError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn list_returns_every_pending_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSessionStore::new(dir.path());
        let now = OffsetDateTime::now_utc();
        for state in ["a", "b"] {
            store
                .save(&PendingSession {
                    state: state.to_string(),
                    provider: Provider::Claude,
                    code_verifier: None,
                    redirect_uri: None,
                    device_code: None,
                    user_code: None,
                    verification_uri: None,
                    poll_interval: None,
                    created_at: now,
                    expires_at: now + time::Duration::seconds(PendingSession::DEFAULT_TTL_SECS),
                })
                .await
                .unwrap();
        }
        assert_eq!(store.list().await.unwrap().len(), 2);
    }
}
