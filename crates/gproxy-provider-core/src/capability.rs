use async_trait::async_trait;
use gproxy_common::Provider;
use gproxy_storage::{CredentialRecord, PendingSession};

use crate::errors::ProviderResult;

/// A fresh authorization-code (PKCE) handshake, ready to be shown to the
/// caller and persisted by the auth manager.
#[derive(Debug, Clone)]
pub struct OAuthStart {
    pub authorize_url: String,
    pub session: PendingSession,
    /// Kiro starts its browser flow in incognito mode; every other
    /// provider leaves this false.
    pub incognito: bool,
}

#[async_trait]
pub trait OAuthCapable: Send + Sync {
    fn provider(&self) -> Provider;

    async fn start_oauth(&self) -> ProviderResult<OAuthStart>;

    async fn handle_callback(
        &self,
        session: &PendingSession,
        code: &str,
    ) -> ProviderResult<CredentialRecord>;

    async fn refresh_token(&self, record: &CredentialRecord) -> ProviderResult<CredentialRecord>;
}

#[derive(Debug, Clone)]
pub struct DeviceFlowStart {
    pub session: PendingSession,
}

#[derive(Debug, Clone)]
pub enum DevicePollOutcome {
    Pending,
    Completed(Box<CredentialRecord>),
    Expired,
    Error(String),
}

#[async_trait]
pub trait DeviceCodeCapable: Send + Sync {
    fn provider(&self) -> Provider;

    async fn start_device_flow(&self) -> ProviderResult<DeviceFlowStart>;

    /// Must respect `authorization_pending`/`slow_down` upstream signals
    /// by returning `Pending` rather than `Error`.
    async fn poll_for_token(&self, session: &PendingSession) -> ProviderResult<DevicePollOutcome>;

    /// Most device-code credentials are refreshed by repeating the
    /// device flow; Copilot overrides this to redeem the retained GitHub
    /// token for a fresh short-lived Copilot token instead.
    async fn refresh_token(&self, _record: &CredentialRecord) -> ProviderResult<CredentialRecord> {
        Err(crate::errors::ProviderError::Unsupported(
            "device-code refresh requires restarting the flow",
        ))
    }
}

#[async_trait]
pub trait ServiceAccountCapable: Send + Sync {
    fn provider(&self) -> Provider;

    async fn import_service_account(
        &self,
        json: serde_json::Value,
    ) -> ProviderResult<CredentialRecord>;

    async fn refresh_token(&self, record: &CredentialRecord) -> ProviderResult<CredentialRecord>;
}
