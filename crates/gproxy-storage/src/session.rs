use gproxy_common::Provider;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Ephemeral OAuth/device-code handshake state, keyed by `state`. Lives
/// under `sessions/` and is deleted once the flow completes or expires,
/// never part of a credential's durable history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingSession {
    pub state: String,
    pub provider: Provider,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<u64>,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl PendingSession {
    pub const DEFAULT_TTL_SECS: i64 = 600;

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}
