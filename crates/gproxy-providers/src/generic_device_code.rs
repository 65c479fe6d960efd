use async_trait::async_trait;
use gproxy_common::{Provider, Tier};
use gproxy_provider_core::{DeviceCodeCapable, DeviceFlowStart, DevicePollOutcome, ProviderError, ProviderResult};
use gproxy_storage::{CredentialRecord, CredentialStatus, PendingSession};
use time::OffsetDateTime;

pub struct DeviceCodeEndpoints {
    pub provider: Provider,
    pub device_auth_url: &'static str,
    pub token_url: &'static str,
    pub client_id: &'static str,
    pub scope: &'static str,
}

pub struct GenericDeviceCodeProvider {
    pub endpoints: DeviceCodeEndpoints,
    pub client: reqwest::Client,
}

impl GenericDeviceCodeProvider {
    pub fn new(endpoints: DeviceCodeEndpoints, client: reqwest::Client) -> Self {
        Self { endpoints, client }
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
struct DeviceTokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
impl DeviceCodeCapable for GenericDeviceCodeProvider {
    fn provider(&self) -> Provider {
        self.endpoints.provider
    }

    async fn start_device_flow(&self) -> ProviderResult<DeviceFlowStart> {
        let resp = self
            .client
            .post(self.endpoints.device_auth_url)
            .form(&[("client_id", self.endpoints.client_id), ("scope", self.endpoints.scope)])
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|err| ProviderError::Upstream(err.to_string()))?;
        if !resp.status().is_success() {
            return Err(ProviderError::Upstream(format!(
                "device_code request failed: {}",
                resp.status()
            )));
        }
        let body: DeviceAuthResponse = resp
            .json()
            .await
            .map_err(|err| ProviderError::Upstream(err.to_string()))?;

        let now = OffsetDateTime::now_utc();
        let ttl = body.expires_in.unwrap_or(PendingSession::DEFAULT_TTL_SECS);
        let session = PendingSession {
            state: uuid::Uuid::new_v4().to_string(),
            provider: self.endpoints.provider,
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
            .post(self.endpoints.token_url)
            .form(&[
                ("client_id", self.endpoints.client_id),
                ("device_code", device_code),
                ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
            ])
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|err| ProviderError::Upstream(err.to_string()))?;
        let body: DeviceTokenResponse = resp
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
        let Some(access_token) = body.access_token else {
            return Ok(DevicePollOutcome::Pending);
        };

        let now = OffsetDateTime::now_utc();
        let record = CredentialRecord {
            schema_version: gproxy_common::SCHEMA_VERSION,
            id: uuid::Uuid::new_v4().to_string(),
            provider: self.endpoints.provider,
            access_token,
            refresh_token: body.refresh_token,
            expires_at: body
                .expires_in
                .map(|secs| now + time::Duration::seconds(secs)),
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
            extra: serde_json::Map::new(),
        };
        Ok(DevicePollOutcome::Completed(Box::new(record)))
    }
}
