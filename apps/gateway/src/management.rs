use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use gproxy_common::{GatewayConfig, Provider};
use gproxy_core::RequestLogEntry;
use gproxy_routing::{FallbackConfig, FallbackEntry, VirtualModel};
use gproxy_storage::CredentialRecord;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::GatewayState;

/// A credential record with bearer material stripped: token material
/// must never leave the process except to the issuing provider, and
/// that includes this gateway's own management API.
fn redact(record: &CredentialRecord) -> serde_json::Value {
    serde_json::json!({
        "id": record.id,
        "provider": record.provider,
        "email": record.email,
        "name": record.name,
        "projectId": record.project_id,
        "region": record.region,
        "tier": record.tier,
        "status": record.status,
        "statusMessage": record.status_message,
        "disabled": record.disabled,
        "cooldownUntil": record.cooldown_until,
        "cooldownReason": record.cooldown_reason,
        "quotaUsed": record.quota_used,
        "quotaLimit": record.quota_limit,
        "quotaResetAt": record.quota_reset_at,
        "createdAt": record.created_at,
        "updatedAt": record.updated_at,
    })
}

fn log_entry_json(entry: &RequestLogEntry) -> serde_json::Value {
    serde_json::json!({
        "id": entry.id,
        "at": entry.at,
        "virtualModel": entry.virtual_model,
        "provider": entry.provider,
        "modelId": entry.model_id,
        "outcome": entry.outcome,
    })
}

fn parse_provider(s: &str) -> Result<Provider, ApiError> {
    Provider::parse(s).ok_or_else(|| ApiError(gproxy_core::GatewayError::BadRequest(format!("unknown provider: {s}"))))
}

// ---- Auth ----

pub async fn list_auth(State(state): State<GatewayState>) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    let records = state.app.auth_manager.list_auth_files().await?;
    Ok(Json(records.iter().map(redact).collect()))
}

pub async fn list_auth_by_provider(
    State(state): State<GatewayState>,
    Path(provider): Path<String>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    let provider = parse_provider(&provider)?;
    let records = state.app.auth_manager.get_auth_files_by_provider(provider).await?;
    Ok(Json(records.iter().map(redact).collect()))
}

pub async fn delete_auth(State(state): State<GatewayState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    state.app.auth_manager.delete_auth_file(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_auth_by_provider(
    State(state): State<GatewayState>,
    Path(provider): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let provider = parse_provider(&provider)?;
    let deleted = state.app.auth_manager.delete_by_provider(provider).await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

// ---- OAuth / device-code / service-account ----

#[derive(Debug, Deserialize)]
pub struct ProviderBody {
    pub provider: String,
}

pub async fn start_oauth(State(state): State<GatewayState>, Json(body): Json<ProviderBody>) -> Result<Json<serde_json::Value>, ApiError> {
    let provider = parse_provider(&body.provider)?;
    let start = state.app.auth_manager.start_oauth(provider).await?;
    Ok(Json(serde_json::json!({
        "authorizeUrl": start.authorize_url,
        "state": start.session.state,
        "incognito": start.incognito,
    })))
}

#[derive(Debug, Deserialize)]
pub struct OAuthStatusQuery {
    pub state: String,
}

pub async fn oauth_status(
    State(state): State<GatewayState>,
    Query(query): Query<OAuthStatusQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let status = state.app.auth_manager.get_oauth_status(&query.state).await?;
    Ok(Json(match status {
        gproxy_core::OAuthStatus::Pending => serde_json::json!({ "status": "pending" }),
        gproxy_core::OAuthStatus::Completed(record) => {
            serde_json::json!({ "status": "completed", "credential": redact(&record) })
        }
    }))
}

pub async fn device_start(State(state): State<GatewayState>, Json(body): Json<ProviderBody>) -> Result<Json<serde_json::Value>, ApiError> {
    let provider = parse_provider(&body.provider)?;
    let start = state.app.auth_manager.start_device_flow(provider).await?;
    Ok(Json(serde_json::json!({
        "deviceCode": start.session.device_code,
        "userCode": start.session.user_code,
        "verificationUri": start.session.verification_uri,
        "pollInterval": start.session.poll_interval,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePollBody {
    pub provider: String,
    pub device_code: String,
}

pub async fn device_poll(State(state): State<GatewayState>, Json(body): Json<DevicePollBody>) -> Result<Json<serde_json::Value>, ApiError> {
    let provider = parse_provider(&body.provider)?;
    let outcome = state.app.auth_manager.poll_device_code(provider, &body.device_code).await?;
    Ok(Json(match outcome {
        gproxy_provider_core::DevicePollOutcome::Pending => serde_json::json!({ "status": "pending" }),
        gproxy_provider_core::DevicePollOutcome::Completed(record) => {
            serde_json::json!({ "status": "completed", "provider": record.provider, "credential": redact(&record) })
        }
        gproxy_provider_core::DevicePollOutcome::Expired => serde_json::json!({ "status": "expired" }),
        gproxy_provider_core::DevicePollOutcome::Error(message) => {
            serde_json::json!({ "status": "error", "message": message })
        }
    }))
}

#[derive(Debug, Deserialize)]
pub struct ImportServiceAccountBody {
    pub provider: String,
    pub credential: serde_json::Value,
}

pub async fn import_service_account(
    State(state): State<GatewayState>,
    Json(body): Json<ImportServiceAccountBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let provider = parse_provider(&body.provider)?;
    let record = state.app.auth_manager.import_service_account(provider, body.credential).await?;
    Ok(Json(redact(&record)))
}

/// Refreshes every enabled, non-error credential on file for `provider`
/// and returns the redacted results; there's no single "current"
/// credential to target since the pool can hold several per provider.
pub async fn oauth_refresh(
    State(state): State<GatewayState>,
    Path(provider): Path<String>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    let provider = parse_provider(&provider)?;
    let candidates = state.app.auth_manager.get_auth_files_by_provider(provider).await?;
    let mut refreshed = Vec::new();
    for record in candidates.into_iter().filter(|r| !r.disabled && r.status != gproxy_storage::CredentialStatus::Error) {
        let record = state.app.auth_manager.refresh_if_needed(record).await?;
        refreshed.push(redact(&record));
    }
    Ok(Json(refreshed))
}

// ---- Fallback ----

pub async fn get_fallback(State(state): State<GatewayState>) -> Json<FallbackConfig> {
    Json((*state.app.fallback.config()).clone())
}

#[derive(Debug, Deserialize)]
pub struct SetEnabledBody {
    pub name: String,
    pub enabled: bool,
}

pub async fn set_fallback_enabled(State(state): State<GatewayState>, Json(body): Json<SetEnabledBody>) -> Result<StatusCode, ApiError> {
    state.app.fallback.set_enabled(&body.name, body.enabled).await.map_err(gproxy_core::GatewayError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_virtual_models(State(state): State<GatewayState>) -> Json<Vec<VirtualModel>> {
    Json(state.app.fallback.list_virtual_models())
}

pub async fn get_virtual_model(State(state): State<GatewayState>, Path(name): Path<String>) -> Result<Json<VirtualModel>, ApiError> {
    Ok(Json(state.app.fallback.get_virtual_model(&name).map_err(gproxy_core::GatewayError::from)?))
}

pub async fn upsert_virtual_model(State(state): State<GatewayState>, Json(vm): Json<VirtualModel>) -> Result<StatusCode, ApiError> {
    state.app.fallback.upsert_virtual_model(vm).await.map_err(gproxy_core::GatewayError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_virtual_model(State(state): State<GatewayState>, Path(name): Path<String>) -> Result<StatusCode, ApiError> {
    state.app.fallback.delete_virtual_model(&name).await.map_err(gproxy_core::GatewayError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_entries(State(state): State<GatewayState>, Path(name): Path<String>) -> Result<Json<Vec<FallbackEntry>>, ApiError> {
    Ok(Json(state.app.fallback.get_virtual_model(&name).map_err(gproxy_core::GatewayError::from)?.entries))
}

pub async fn add_entry(
    State(state): State<GatewayState>,
    Path(name): Path<String>,
    Json(entry): Json<FallbackEntry>,
) -> Result<StatusCode, ApiError> {
    state.app.fallback.add_entry(&name, entry).await.map_err(gproxy_core::GatewayError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveEntryBody {
    pub provider: Provider,
    pub model_id: String,
}

pub async fn remove_entry(
    State(state): State<GatewayState>,
    Path(name): Path<String>,
    Json(body): Json<RemoveEntryBody>,
) -> Result<StatusCode, ApiError> {
    state.app.fallback.remove_entry(&name, body.provider, &body.model_id).await.map_err(gproxy_core::GatewayError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn export_fallback(State(state): State<GatewayState>) -> Json<FallbackConfig> {
    Json((*state.app.fallback.config()).clone())
}

pub async fn import_fallback(State(state): State<GatewayState>, Json(config): Json<FallbackConfig>) -> Result<StatusCode, ApiError> {
    state.app.fallback.save(config).await.map_err(gproxy_core::GatewayError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- Logs & stats ----

pub async fn list_logs(State(state): State<GatewayState>) -> Json<Vec<serde_json::Value>> {
    let entries = state.app.request_log.snapshot().await;
    Json(entries.iter().map(log_entry_json).collect())
}

pub async fn clear_logs(State(state): State<GatewayState>) -> StatusCode {
    state.app.request_log.clear().await;
    StatusCode::NO_CONTENT
}

pub async fn get_stats(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    let records = state.app.auth_manager.list_auth_files().await.unwrap_or_default();
    let pools: Vec<serde_json::Value> = Provider::ALL
        .into_iter()
        .map(|provider| {
            let for_provider: Vec<&CredentialRecord> = records.iter().filter(|r| r.provider == provider).collect();
            serde_json::json!({
                "provider": provider,
                "credentialsTotal": for_provider.len(),
                "credentialsEnabled": for_provider.iter().filter(|r| !r.disabled).count(),
            })
        })
        .collect();
    Json(serde_json::json!({ "providers": pools }))
}

pub async fn get_request_stats(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    let stats = state.app.request_log.stats().await;
    Json(serde_json::json!({
        "total": stats.total,
        "ok": stats.ok,
        "error": stats.error,
        "byProvider": stats.by_provider,
    }))
}

pub async fn clear_request_stats(State(state): State<GatewayState>) -> StatusCode {
    state.app.request_log.clear().await;
    StatusCode::NO_CONTENT
}

// ---- Config ----

const CONFIG_KEYS: &[&str] = &[
    "host",
    "port",
    "authDir",
    "configDir",
    "apiKeys",
    "debug",
    "loggingToFile",
    "routingStrategy",
    "requestRetry",
    "maxRetryInterval",
    "quotaExceededSwitchProject",
    "quotaExceededSwitchPreviewModel",
];

fn config_json(config: &GatewayConfig) -> serde_json::Value {
    serde_json::json!({
        "host": config.host,
        "port": config.port,
        "authDir": config.auth_dir,
        "configDir": config.config_dir,
        "apiKeys": config.api_keys,
        "debug": config.debug,
        "loggingToFile": config.logging_to_file,
        "routingStrategy": config.routing_strategy,
        "requestRetry": config.request_retry,
        "maxRetryInterval": config.max_retry_interval,
        "quotaExceededSwitchProject": config.quota_exceeded_switch_project,
        "quotaExceededSwitchPreviewModel": config.quota_exceeded_switch_preview_model,
        "remoteManagement": { "allowRemote": config.remote_management.allow_remote, "disableControlPanel": config.remote_management.disable_control_panel },
    })
}

fn config_key_value(config: &GatewayConfig, key: &str) -> Option<serde_json::Value> {
    Some(match key {
        "host" => serde_json::json!(config.host),
        "port" => serde_json::json!(config.port),
        "authDir" => serde_json::json!(config.auth_dir),
        "configDir" => serde_json::json!(config.config_dir),
        "apiKeys" => serde_json::json!(config.api_keys),
        "debug" => serde_json::json!(config.debug),
        "loggingToFile" => serde_json::json!(config.logging_to_file),
        "routingStrategy" => serde_json::json!(config.routing_strategy),
        "requestRetry" => serde_json::json!(config.request_retry),
        "maxRetryInterval" => serde_json::json!(config.max_retry_interval),
        "quotaExceededSwitchProject" => serde_json::json!(config.quota_exceeded_switch_project),
        "quotaExceededSwitchPreviewModel" => serde_json::json!(config.quota_exceeded_switch_preview_model),
        _ => return None,
    })
}

fn apply_config_key(mut config: GatewayConfig, key: &str, value: serde_json::Value) -> Result<GatewayConfig, ApiError> {
    let bad = |err: serde_json::Error| ApiError(gproxy_core::GatewayError::BadRequest(err.to_string()));
    match key {
        "host" => config.host = serde_json::from_value(value).map_err(bad)?,
        "port" => config.port = serde_json::from_value(value).map_err(bad)?,
        "authDir" => config.auth_dir = serde_json::from_value(value).map_err(bad)?,
        "configDir" => config.config_dir = serde_json::from_value(value).map_err(bad)?,
        "apiKeys" => config.api_keys = serde_json::from_value(value).map_err(bad)?,
        "debug" => config.debug = serde_json::from_value(value).map_err(bad)?,
        "loggingToFile" => config.logging_to_file = serde_json::from_value(value).map_err(bad)?,
        "routingStrategy" => config.routing_strategy = serde_json::from_value(value).map_err(bad)?,
        "requestRetry" => config.request_retry = serde_json::from_value(value).map_err(bad)?,
        "maxRetryInterval" => config.max_retry_interval = serde_json::from_value(value).map_err(bad)?,
        "quotaExceededSwitchProject" => config.quota_exceeded_switch_project = serde_json::from_value(value).map_err(bad)?,
        "quotaExceededSwitchPreviewModel" => config.quota_exceeded_switch_preview_model = serde_json::from_value(value).map_err(bad)?,
        _ => return Err(ApiError(gproxy_core::GatewayError::NotFound(format!("unknown config key: {key}")))),
    }
    Ok(config)
}

/// The value a key resets to on `DELETE`: a freshly-defaulted config
/// with the operator's current `authDir`/`configDir` carried over, since
/// those two have no sensible built-in default.
fn default_config(current: &GatewayConfig) -> Result<GatewayConfig, ApiError> {
    let mut patch = gproxy_common::GatewayConfigPatch::default();
    patch.auth_dir = Some(current.auth_dir.clone());
    patch.config_dir = Some(current.config_dir.clone());
    patch
        .into_config()
        .map_err(|err| ApiError(gproxy_core::GatewayError::Config(err.to_string())))
}

pub async fn get_config(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(config_json(&state.app.config.load_full()))
}

pub async fn get_config_key(State(state): State<GatewayState>, Path(key): Path<String>) -> Result<Json<serde_json::Value>, ApiError> {
    let config = state.app.config.load_full();
    config_key_value(&config, &key)
        .map(Json)
        .ok_or_else(|| ApiError(gproxy_core::GatewayError::NotFound(format!("unknown config key: {key}"))))
}

#[derive(Debug, Deserialize)]
pub struct ConfigValueBody {
    pub value: serde_json::Value,
}

pub async fn put_config_key(
    State(state): State<GatewayState>,
    Path(key): Path<String>,
    Json(body): Json<ConfigValueBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !CONFIG_KEYS.contains(&key.as_str()) {
        return Err(ApiError(gproxy_core::GatewayError::NotFound(format!("unknown config key: {key}"))));
    }
    let current = (*state.app.config.load_full()).clone();
    let updated = apply_config_key(current, &key, body.value)?;
    let value = config_key_value(&updated, &key);
    state.app.config.store(std::sync::Arc::new(updated));
    Ok(Json(value.unwrap_or(serde_json::Value::Null)))
}

pub async fn delete_config_key(State(state): State<GatewayState>, Path(key): Path<String>) -> Result<Json<serde_json::Value>, ApiError> {
    if !CONFIG_KEYS.contains(&key.as_str()) {
        return Err(ApiError(gproxy_core::GatewayError::NotFound(format!("unknown config key: {key}"))));
    }
    let current = (*state.app.config.load_full()).clone();
    let defaults = default_config(&current)?;
    let reset_value = config_key_value(&defaults, &key).unwrap_or(serde_json::Value::Null);
    let updated = apply_config_key(current, &key, reset_value.clone())?;
    state.app.config.store(std::sync::Arc::new(updated));
    Ok(Json(reset_value))
}

// ---- Keys ----

pub async fn list_keys(State(state): State<GatewayState>) -> Json<Vec<String>> {
    Json(state.app.config.load_full().api_keys.clone())
}

#[derive(Debug, Deserialize)]
pub struct AddKeyBody {
    pub key: String,
}

pub async fn add_key(State(state): State<GatewayState>, Json(body): Json<AddKeyBody>) -> Json<Vec<String>> {
    let mut config = (*state.app.config.load_full()).clone();
    if !config.api_keys.contains(&body.key) {
        config.api_keys.push(body.key);
    }
    let keys = config.api_keys.clone();
    state.app.config.store(std::sync::Arc::new(config));
    Json(keys)
}

pub async fn delete_key(State(state): State<GatewayState>, Path(key): Path<String>) -> Json<Vec<String>> {
    let mut config = (*state.app.config.load_full()).clone();
    config.api_keys.retain(|k| k != &key);
    let keys = config.api_keys.clone();
    state.app.config.store(std::sync::Arc::new(config));
    Json(keys)
}

pub fn router() -> axum::Router<GatewayState> {
    use axum::routing::{delete, get, post};
    axum::Router::new()
        .route("/auth", get(list_auth))
        .route("/auth/provider/{provider}", delete(delete_auth_by_provider))
        .route("/auth/{ident}", get(list_auth_by_provider).delete(delete_auth))
        .route("/oauth/start", post(start_oauth))
        .route("/oauth/status", get(oauth_status))
        .route("/oauth/device-start", post(device_start))
        .route("/oauth/device-poll", post(device_poll))
        .route("/oauth/import-service-account", post(import_service_account))
        .route("/oauth/refresh/{provider}", post(oauth_refresh))
        .route("/api/fallback", get(get_fallback))
        .route("/api/fallback/enabled", post(set_fallback_enabled))
        .route("/api/fallback/models", get(list_virtual_models).post(upsert_virtual_model))
        .route("/api/fallback/models/{name}", get(get_virtual_model).delete(delete_virtual_model))
        .route("/api/fallback/models/{name}/entries", get(list_entries).post(add_entry).delete(remove_entry))
        .route("/api/fallback/export", get(export_fallback))
        .route("/api/fallback/import", post(import_fallback))
        .route("/api/logs", get(list_logs).delete(clear_logs))
        .route("/api/stats", get(get_stats))
        .route("/api/stats/requests", get(get_request_stats).delete(clear_request_stats))
        .route("/api/config", get(get_config))
        .route("/api/config/{key}", get(get_config_key).put(put_config_key).delete(delete_config_key))
        .route("/api/keys", get(list_keys).post(add_key))
        .route("/api/keys/{key}", delete(delete_key))
        // kept for compatibility with the old config-file-centric shape
        .route("/fallback-config", get(get_fallback).put(import_fallback))
}
