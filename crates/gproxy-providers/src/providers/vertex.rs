use async_trait::async_trait;
use gproxy_common::{Provider, Tier};
use gproxy_provider_core::{ProviderError, ProviderResult, ServiceAccountCapable};
use gproxy_storage::{CredentialRecord, CredentialStatus};
use time::OffsetDateTime;

use crate::jwt::sign_service_account_assertion;

const SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Debug, serde::Deserialize)]
struct ServiceAccountJson {
    project_id: String,
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

pub struct VertexProvider {
    client: reqwest::Client,
}

impl VertexProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn exchange(&self, sa: &ServiceAccountJson) -> ProviderResult<TokenResponse> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let assertion =
            sign_service_account_assertion(&sa.client_email, &sa.token_uri, &sa.private_key, SCOPE, now)?;
        let resp = self
            .client
            .post(&sa.token_uri)
            .form(&[("grant_type", GRANT_TYPE), ("assertion", &assertion)])
            .send()
            .await
            .map_err(|err| ProviderError::Upstream(err.to_string()))?;
        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|err| ProviderError::Upstream(err.to_string()))?;
        if !status.is_success() {
            return Err(ProviderError::Upstream(format!(
                "vertex jwt-bearer exchange failed: {status} {}",
                String::from_utf8_lossy(&bytes)
            )));
        }
        serde_json::from_slice(&bytes).map_err(|err| ProviderError::Upstream(err.to_string()))
    }
}

#[async_trait]
impl ServiceAccountCapable for VertexProvider {
    fn provider(&self) -> Provider {
        Provider::Vertex
    }

    async fn import_service_account(
        &self,
        json: serde_json::Value,
    ) -> ProviderResult<CredentialRecord> {
        let sa: ServiceAccountJson = serde_json::from_value(json.clone())
            .map_err(|err| ProviderError::InvalidConfig(format!("invalid service account json: {err}")))?;
        let tokens = self.exchange(&sa).await?;

        let now = OffsetDateTime::now_utc();
        Ok(CredentialRecord {
            schema_version: gproxy_common::SCHEMA_VERSION,
            id: uuid::Uuid::new_v4().to_string(),
            provider: Provider::Vertex,
            access_token: tokens.access_token,
            refresh_token: None,
            expires_at: tokens
                .expires_in
                .map(|secs| now + time::Duration::seconds(secs)),
            email: Some(sa.client_email),
            name: None,
            project_id: Some(sa.project_id),
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
            service_account_json: Some(gproxy_common::Sensitive(json)),
            created_at: now,
            updated_at: now,
            extra: serde_json::Map::new(),
        })
    }

    async fn refresh_token(&self, record: &CredentialRecord) -> ProviderResult<CredentialRecord> {
        let Some(json) = record.service_account_json.as_ref() else {
            return Err(ProviderError::InvalidConfig(
                "no serviceAccountJson on record".to_string(),
            ));
        };
        let sa: ServiceAccountJson = serde_json::from_value(json.0.clone())
            .map_err(|err| ProviderError::InvalidConfig(format!("invalid service account json: {err}")))?;
        let tokens = self.exchange(&sa).await?;

        let mut updated = record.clone();
        let now = OffsetDateTime::now_utc();
        updated.access_token = tokens.access_token;
        updated.expires_at = tokens
            .expires_in
            .map(|secs| now + time::Duration::seconds(secs));
        updated.status = CredentialStatus::Ready;
        updated.status_message = None;
        updated.updated_at = now;
        Ok(updated)
    }
}
