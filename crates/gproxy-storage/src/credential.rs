use gproxy_common::{Provider, Sensitive, Tier, SCHEMA_VERSION};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Durable per-credential record. Keyed by an opaque id, stable across
/// refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub id: String,
    pub provider: Provider,

    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default)]
    pub tier: Tier,
    #[serde(default)]
    pub status: CredentialStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,

    #[serde(default)]
    pub disabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "time::serde::rfc3339::option")]
    pub cooldown_until: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_used: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "time::serde::rfc3339::option")]
    pub quota_reset_at: Option<OffsetDateTime>,

    /// GitHub token used to mint Copilot tokens, PKCS8 service-account
    /// keys, etc. Never logged (`Sensitive`'s `Debug` redacts it), and
    /// never serialized out of this crate except back to disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_data: Option<Sensitive<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_json: Option<Sensitive<serde_json::Value>>,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,

    /// Unknown-but-present fields round-trip through here on rewrite.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    Ready,
    Refreshing,
    Cooling,
    Error,
}

impl Default for CredentialStatus {
    fn default() -> Self {
        CredentialStatus::Ready
    }
}

impl CredentialRecord {
    /// Eligible for selection iff ready, not disabled, and not cooling down.
    pub fn is_selection_eligible(&self, now: OffsetDateTime) -> bool {
        self.status == CredentialStatus::Ready
            && !self.disabled
            && self.cooldown_until.map(|t| t <= now).unwrap_or(true)
    }
}
