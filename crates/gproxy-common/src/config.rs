use serde::{Deserialize, Serialize};

/// Final, merged configuration used by the running process.
///
/// Merge order: CLI > ENV > config file (`{configDir}/config.json`), then
/// the merged result is what callers read for the lifetime of the process
/// (live reload is limited to the fields the management API exposes under
/// `/api/config`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub tls: TlsConfig,
    pub auth_dir: String,
    pub config_dir: String,
    pub api_keys: Vec<String>,
    pub debug: bool,
    pub logging_to_file: bool,
    /// `round-robin` | `fill-first`; `smart-priority` is per virtual model.
    pub routing_strategy: String,
    pub request_retry: u32,
    pub max_retry_interval: u64,
    pub quota_exceeded_switch_project: bool,
    pub quota_exceeded_switch_preview_model: bool,
    pub remote_management: RemoteManagementConfig,
    pub passthrough: PassthroughConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    pub enable: bool,
    pub cert: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteManagementConfig {
    pub allow_remote: bool,
    pub secret_key: Option<String>,
    pub disable_control_panel: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassthroughConfig {
    pub enabled: bool,
    pub cli_proxy_port: Option<u16>,
    pub timeout: u64,
}

impl Default for PassthroughConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cli_proxy_port: None,
            timeout: 120,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayConfigError {
    #[error("missing required config field: {0}")]
    MissingField(&'static str),
}

/// Optional layer used while merging CLI, environment, and file config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfigPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsConfig>,
    pub auth_dir: Option<String>,
    pub config_dir: Option<String>,
    pub api_keys: Option<Vec<String>>,
    pub debug: Option<bool>,
    pub logging_to_file: Option<bool>,
    pub routing_strategy: Option<String>,
    pub request_retry: Option<u32>,
    pub max_retry_interval: Option<u64>,
    pub quota_exceeded_switch_project: Option<bool>,
    pub quota_exceeded_switch_preview_model: Option<bool>,
    pub remote_management: Option<RemoteManagementConfig>,
    pub passthrough: Option<PassthroughConfig>,
}

impl GatewayConfigPatch {
    /// Overlay `other` on top of `self`; fields present in `other` win.
    /// Used to apply ENV on top of the file, then CLI on top of that.
    pub fn overlay(&mut self, other: GatewayConfigPatch) {
        macro_rules! take {
            ($field:ident) => {
                if other.$field.is_some() {
                    self.$field = other.$field;
                }
            };
        }
        take!(host);
        take!(port);
        take!(tls);
        take!(auth_dir);
        take!(config_dir);
        take!(api_keys);
        take!(debug);
        take!(logging_to_file);
        take!(routing_strategy);
        take!(request_retry);
        take!(max_retry_interval);
        take!(quota_exceeded_switch_project);
        take!(quota_exceeded_switch_preview_model);
        take!(remote_management);
        take!(passthrough);
    }

    pub fn into_config(self) -> Result<GatewayConfig, GatewayConfigError> {
        Ok(GatewayConfig {
            host: self.host.unwrap_or_else(|| "127.0.0.1".to_string()),
            port: self.port.unwrap_or(18317),
            tls: self.tls.unwrap_or_default(),
            auth_dir: self
                .auth_dir
                .ok_or(GatewayConfigError::MissingField("auth_dir"))?,
            config_dir: self
                .config_dir
                .ok_or(GatewayConfigError::MissingField("config_dir"))?,
            api_keys: self.api_keys.unwrap_or_default(),
            debug: self.debug.unwrap_or(false),
            logging_to_file: self.logging_to_file.unwrap_or(false),
            routing_strategy: self
                .routing_strategy
                .unwrap_or_else(|| "round-robin".to_string()),
            request_retry: self.request_retry.unwrap_or(3),
            max_retry_interval: self.max_retry_interval.unwrap_or(30),
            quota_exceeded_switch_project: self.quota_exceeded_switch_project.unwrap_or(false),
            quota_exceeded_switch_preview_model: self
                .quota_exceeded_switch_preview_model
                .unwrap_or(false),
            remote_management: self.remote_management.unwrap_or_default(),
            passthrough: self.passthrough.unwrap_or_default(),
        })
    }
}

impl From<GatewayConfig> for GatewayConfigPatch {
    fn from(value: GatewayConfig) -> Self {
        Self {
            host: Some(value.host),
            port: Some(value.port),
            tls: Some(value.tls),
            auth_dir: Some(value.auth_dir),
            config_dir: Some(value.config_dir),
            api_keys: Some(value.api_keys),
            debug: Some(value.debug),
            logging_to_file: Some(value.logging_to_file),
            routing_strategy: Some(value.routing_strategy),
            request_retry: Some(value.request_retry),
            max_retry_interval: Some(value.max_retry_interval),
            quota_exceeded_switch_project: Some(value.quota_exceeded_switch_project),
            quota_exceeded_switch_preview_model: Some(value.quota_exceeded_switch_preview_model),
            remote_management: Some(value.remote_management),
            passthrough: Some(value.passthrough),
        }
    }
}
