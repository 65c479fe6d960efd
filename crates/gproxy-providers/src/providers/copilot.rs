use async_trait::async_trait;
use gproxy_common::{Provider, Tier};
use gproxy_provider_core::{DeviceCodeCapable, DeviceFlowStart, DevicePollOutcome, ProviderError, ProviderResult};
use gproxy_storage::{CredentialRecord, CredentialStatus, PendingSession};
use time::OffsetDateTime;

const DEVICE_AUTH_URL: &str = "https://github.com/login/device/code";
const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const COPILOT_TOKEN_URL: &str = "https://api.github.com/copilot_internal/v2/token";
const CLIENT_ID: &str = "Iv1.b507a08c87ecfe98";
const SCOPE: &str = "read:user";

/// GitHub device-code flow followed by a second exchange that mints a
/// short-lived Copilot token: the device flow yields a GitHub token,
/// then a second call trades it for the Copilot token actually used on
/// requests.
pub struct CopilotProvider {
    client: reqwest::Client,
}

impl CopilotProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn mint_copilot_token(&self, github_token: &str) -> ProviderResult<CopilotTokenResponse> {
        let resp = self
            .client
            .get(COPILOT_TOKEN_URL)
            .bearer_auth(github_token)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|err| ProviderError::Upstream(err.to_string()))?;
        if !resp.status().is_success() {
            return Err(ProviderError::Upstream(format!(
                "copilot token mint failed: {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|err| ProviderError::Upstream(err.to_string()))
    }
}

#[derive(Debug, serde::Deserialize)]
struct DeviceAuthResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    #[serde(default = "default_interval")]
    interval: u64,
    #[serde(default)]
    expires_in: Option<i64>,
}

fn default_interval() -> u64 {
    5
}

#[derive(Debug, serde::Deserialize)]
struct GithubTokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct CopilotTokenResponse {
    token: String,
    expires_at: i64,
}

#[async_trait]
impl DeviceCodeCapable for CopilotProvider {
    fn provider(&self) -> Provider {
        Provider::GithubCopilot
    }

    async fn start_device_flow(&self) -> ProviderResult<DeviceFlowStart> {
        let resp = self
            .client
            .post(DEVICE_AUTH_URL)
            .form(&[("client_id", CLIENT_ID), ("scope", SCOPE)])
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|err| ProviderError::Upstream(err.to_string()))?;
        let body: DeviceAuthResponse = resp
            .json()
            .await
            .map_err(|err| ProviderError::Upstream(err.to_string()))?;

        let now = OffsetDateTime::now_utc();
        let ttl = body.expires_in.unwrap_or(PendingSession::DEFAULT_TTL_SECS);
        let session = PendingSession {
            state: uuid::Uuid::new_v4().to_string(),
            provider: Provider::GithubCopilot,
            code_verifier: None,
            redirect_uri: None,
            device_code: Some(body.device_code),
            user_code: Some(body.user_code),
            verification_uri: Some(body.verification_uri),
            poll_interval: Some(body.interval),
            created_at: now,
            expires_at: now + time::Duration::seconds(ttl),
        };
        Ok(DeviceFlowStart { session })
    }

    async fn poll_for_token(&self, session: &PendingSession) -> ProviderResult<DevicePollOutcome> {
        if session.is_expired(OffsetDateTime::now_utc()) {
            return Ok(DevicePollOutcome::Expired);
        }
        let Some(device_code) = session.device_code.as_deref() else {
            return Ok(DevicePollOutcome::Error("session has no device_code".to_string()));
        };

        let resp = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("client_id", CLIENT_ID),
                ("device_code", device_code),
                ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
            ])
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|err| ProviderError::Upstream(err.to_string()))?;
        let body: GithubTokenResponse = resp
            .json()
            .await
            .map_err(|err| ProviderError::Upstream(err.to_string()))?;

        if let Some(error) = body.error.as_deref() {
            return match error {
                "authorization_pending" | "slow_down" => Ok(DevicePollOutcome::Pending),
                "expired_token" => Ok(DevicePollOutcome::Expired),
                other => Ok(DevicePollOutcome::Error(other.to_string())),
            };
        }
        let Some(github_token) = body.access_token else {
            return Ok(DevicePollOutcome::Pending);
        };

        let copilot = self.mint_copilot_token(&github_token).await?;
        let now = OffsetDateTime::now_utc();
        let record = CredentialRecord {
            schema_version: gproxy_common::SCHEMA_VERSION,
            id: uuid::Uuid::new_v4().to_string(),
            provider: Provider::GithubCopilot,
            access_token: copilot.token,
            refresh_token: None,
            expires_at: OffsetDateTime::from_unix_timestamp(copilot.expires_at).ok(),
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
            token_data: Some(gproxy_common::Sensitive(
                serde_json::json!({ "github_token": github_token }),
            )),
            service_account_json: None,
            created_at: now,
            updated_at: now,
            extra: serde_json::Map::new(),
        };
        Ok(DevicePollOutcome::Completed(Box::new(record)))
    }

    async fn refresh_token(&self, record: &CredentialRecord) -> ProviderResult<CredentialRecord> {
        let github_token = record
            .token_data
            .as_ref()
            .and_then(|data| data.get("github_token"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProviderError::InvalidConfig("missing tokenData.github_token".to_string()))?
            .to_string();

        let copilot = self.mint_copilot_token(&github_token).await?;
        let mut updated = record.clone();
        updated.access_token = copilot.token;
        updated.expires_at = OffsetDateTime::from_unix_timestamp(copilot.expires_at).ok();
        updated.status = CredentialStatus::Ready;
        updated.status_message = None;
        updated.updated_at = OffsetDateTime::now_utc();
        Ok(updated)
    }
}
