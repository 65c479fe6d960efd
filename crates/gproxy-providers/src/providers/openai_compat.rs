use async_trait::async_trait;
use gproxy_common::{Provider, Tier};
use gproxy_provider_core::{ProviderError, ProviderResult, ServiceAccountCapable};
use gproxy_storage::{CredentialRecord, CredentialStatus};
use time::OffsetDateTime;

#[derive(Debug, serde::Deserialize)]
struct OpenAiCompatImport {
    api_key: String,
    #[serde(default)]
    base_url: Option<String>,
}

/// A bare API key against an OpenAI-compatible endpoint. There is no
/// token exchange or expiry here, so "import" and "refresh" both just
/// normalize the same opaque key into a ready record.
pub struct OpenAiCompatProvider;

#[async_trait]
impl ServiceAccountCapable for OpenAiCompatProvider {
    fn provider(&self) -> Provider {
        Provider::OpenaiCompat
    }

    async fn import_service_account(
        &self,
        json: serde_json::Value,
    ) -> ProviderResult<CredentialRecord> {
        let parsed: OpenAiCompatImport = serde_json::from_value(json)
            .map_err(|err| ProviderError::InvalidConfig(format!("invalid import payload: {err}")))?;

        let now = OffsetDateTime::now_utc();
        let mut extra = serde_json::Map::new();
        if let Some(base_url) = parsed.base_url {
            extra.insert("baseUrl".to_string(), serde_json::Value::String(base_url));
        }
        Ok(CredentialRecord {
            schema_version: gproxy_common::SCHEMA_VERSION,
            id: uuid::Uuid::new_v4().to_string(),
            provider: Provider::OpenaiCompat,
            access_token: parsed.api_key,
            refresh_token: None,
            expires_at: None,
            email: None,
            name: None,
            project_id: None,
            region: None,
            tier: Tier::Unknown,
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
            extra,
        })
    }

    async fn refresh_token(&self, record: &CredentialRecord) -> ProviderResult<CredentialRecord> {
        Ok(record.clone())
    }
}
