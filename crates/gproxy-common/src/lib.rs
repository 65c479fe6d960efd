//! Shared types used across every `gproxy-*` crate: the provider
//! discriminator, tier/strategy enums, the gateway configuration envelope,
//! and a handful of small helpers (schema versioning, redaction).

mod config;
mod sensitive;

pub use config::{GatewayConfig, GatewayConfigError, GatewayConfigPatch, PassthroughConfig, RemoteManagementConfig, TlsConfig};
pub use sensitive::Sensitive;

use serde::{Deserialize, Serialize};

/// The current schema version stamped on every persisted JSON document.
/// Readers that find this field absent treat the document as version 1.
pub const SCHEMA_VERSION: u32 = 1;

/// Closed set of upstream providers this gateway can mint credentials for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    GeminiCli,
    Claude,
    Codex,
    GithubCopilot,
    Vertex,
    Kiro,
    Iflow,
    Antigravity,
    Qwen,
    OpenaiCompat,
}

impl Provider {
    pub const ALL: [Provider; 10] = [
        Provider::GeminiCli,
        Provider::Claude,
        Provider::Codex,
        Provider::GithubCopilot,
        Provider::Vertex,
        Provider::Kiro,
        Provider::Iflow,
        Provider::Antigravity,
        Provider::Qwen,
        Provider::OpenaiCompat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::GeminiCli => "gemini-cli",
            Provider::Claude => "claude",
            Provider::Codex => "codex",
            Provider::GithubCopilot => "github-copilot",
            Provider::Vertex => "vertex",
            Provider::Kiro => "kiro",
            Provider::Iflow => "iflow",
            Provider::Antigravity => "antigravity",
            Provider::Qwen => "qwen",
            Provider::OpenaiCompat => "openai-compat",
        }
    }

    pub fn parse(s: &str) -> Option<Provider> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account tier, used to gate access to models that require a paid plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Paid,
    Free,
    Unknown,
}

impl Default for Tier {
    fn default() -> Self {
        Tier::Unknown
    }
}

/// Credential selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    RoundRobin,
    FillFirst,
    SmartPriority,
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::RoundRobin
    }
}

/// Client-facing protocol, identified from the inbound request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClientProtocol {
    OpenaiChat,
    AnthropicMessages,
    Gemini,
}

pub fn now() -> time::OffsetDateTime {
    time::OffsetDateTime::now_utc()
}
