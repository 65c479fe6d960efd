use gproxy_common::{GatewayConfig, GatewayConfigPatch, PassthroughConfig, RemoteManagementConfig};

use crate::cli::Cli;

fn home_dir() -> String {
    std::env::var("HOME").unwrap_or_else(|_| ".".to_string())
}

/// Reads `{configDir}/config.json`; an absent file is an empty patch, same
/// as the Fallback Engine treats a missing `fallback.json` (first boot).
async fn load_file_patch(config_dir: &str) -> anyhow::Result<GatewayConfigPatch> {
    let path = std::path::Path::new(config_dir).join("config.json");
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(GatewayConfigPatch::default()),
        Err(err) => Err(err.into()),
    }
}

/// `GPROXY_*`-prefixed variables, plus the bare `PORT`/`HOST` a platform
/// like a container host or PaaS commonly sets directly.
fn env_patch() -> GatewayConfigPatch {
    let mut patch = GatewayConfigPatch::default();
    patch.host = std::env::var("GPROXY_HOST").or_else(|_| std::env::var("HOST")).ok();
    patch.port = std::env::var("GPROXY_PORT")
        .or_else(|_| std::env::var("PORT"))
        .ok()
        .and_then(|v| v.parse().ok());
    patch.auth_dir = std::env::var("GPROXY_AUTH_DIR").ok();
    patch.config_dir = std::env::var("GPROXY_CONFIG_DIR").ok();
    patch.api_keys = std::env::var("GPROXY_API_KEYS")
        .ok()
        .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect());
    patch.debug = std::env::var("GPROXY_DEBUG").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    patch.routing_strategy = std::env::var("GPROXY_ROUTING_STRATEGY").ok();
    if let Ok(key) = std::env::var("GPROXY_MANAGEMENT_KEY") {
        patch.remote_management = Some(RemoteManagementConfig {
            secret_key: Some(key),
            ..Default::default()
        });
    }
    patch
}

fn cli_patch(cli: &Cli) -> GatewayConfigPatch {
    let mut patch = GatewayConfigPatch::default();
    patch.host = cli.host.clone();
    patch.port = cli.port;
    patch.auth_dir = cli.auth_dir.clone();
    patch.config_dir = cli.config_dir.clone();
    if !cli.api_key.is_empty() {
        patch.api_keys = Some(cli.api_key.clone());
    }
    if cli.debug {
        patch.debug = Some(true);
    }
    patch.routing_strategy = cli.routing_strategy.clone();
    patch.request_retry = cli.request_retry;
    patch.max_retry_interval = cli.max_retry_interval;
    if cli.management_key.is_some() || cli.allow_remote {
        patch.remote_management = Some(RemoteManagementConfig {
            allow_remote: cli.allow_remote,
            secret_key: cli.management_key.clone(),
            disable_control_panel: false,
        });
    }
    if let Some(timeout) = cli.passthrough_timeout {
        patch.passthrough = Some(PassthroughConfig { timeout, ..Default::default() });
    }
    patch
}

/// Merges file < env < CLI into the config the process runs with.
/// `auth_dir`/`config_dir` default under `$HOME/.gproxy` when nothing sets
/// them, since `GatewayConfigPatch::into_config` otherwise requires both.
pub async fn load(cli: &Cli) -> anyhow::Result<GatewayConfig> {
    let home = home_dir();
    let bootstrap_config_dir = cli
        .config_dir
        .clone()
        .or_else(|| std::env::var("GPROXY_CONFIG_DIR").ok())
        .unwrap_or_else(|| format!("{home}/.gproxy/config"));

    let mut merged = load_file_patch(&bootstrap_config_dir).await?;
    merged.overlay(env_patch());
    merged.overlay(cli_patch(cli));

    if merged.auth_dir.is_none() {
        merged.auth_dir = Some(format!("{home}/.gproxy/auth"));
    }
    if merged.config_dir.is_none() {
        merged.config_dir = Some(bootstrap_config_dir);
    }

    Ok(merged.into_config()?)
}
