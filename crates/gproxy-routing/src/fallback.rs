use std::collections::HashMap;
use std::path::{Path, PathBuf};

use arc_swap::ArcSwap;
use gproxy_common::{Provider, Strategy};
use gproxy_provider_core::QuotaGroupTable;
use gproxy_storage::atomic_write_json;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::candidate::{escalate_cooldown_secs, rank_indices, Candidate};
use crate::errors::{RoutingError, RoutingResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FallbackEntry {
    pub provider: Provider,
    pub model_id: String,
    pub priority: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualModel {
    pub name: String,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    #[serde(default)]
    pub strategy: Strategy,
    pub entries: Vec<FallbackEntry>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FallbackConfig {
    #[serde(default)]
    pub virtual_models: Vec<VirtualModel>,
}

/// Per-entry runtime counters. Kept in-memory only, keyed by
/// `(virtual_model, provider, model_id)` so the same upstream
/// `(provider, model)` tracks separately per virtual model it's
/// configured under.
#[derive(Debug, Clone)]
pub struct EntryRuntimeState {
    pub usage_count: u64,
    pub last_used: Option<OffsetDateTime>,
    pub success_rate: f64,
    pub cooldown_until: Option<OffsetDateTime>,
    escalation_step: u32,
}

impl Default for EntryRuntimeState {
    fn default() -> Self {
        Self {
            usage_count: 0,
            last_used: None,
            success_rate: 1.0,
            cooldown_until: None,
            escalation_step: 0,
        }
    }
}

impl EntryRuntimeState {
    fn is_cooling(&self, now: OffsetDateTime) -> bool {
        self.cooldown_until.map(|until| until > now).unwrap_or(false)
    }
}

struct EntryCandidate<'a> {
    entry: &'a FallbackEntry,
    state: &'a EntryRuntimeState,
}

impl Candidate for EntryCandidate<'_> {
    fn usage_count(&self) -> u64 {
        self.state.usage_count
    }

    fn success_rate(&self) -> f64 {
        self.state.success_rate
    }

    fn priority(&self) -> u8 {
        self.entry.priority
    }

    fn has_quota_remaining(&self) -> Option<bool> {
        None
    }

    fn freq_score(&self) -> f64 {
        let rate = self.state.success_rate;
        if rate >= 0.9 {
            1.0
        } else if rate >= 0.7 {
            0.75
        } else if rate >= 0.5 {
            0.50
        } else if rate > 0.0 {
            0.25
        } else {
            0.10
        }
    }
}

type EntryKey = (String, Provider, String);

/// Resolves a virtual model to an ordered chain of `(provider, model)`
/// entries and tracks per-entry success/failure. Configuration is held
/// in `ArcSwap` and persisted through the credential store's atomic
/// writer to a sibling `fallback.json` file; runtime counters are
/// in-memory only.
pub struct FallbackEngine {
    config: ArcSwap<FallbackConfig>,
    runtime: RwLock<HashMap<EntryKey, EntryRuntimeState>>,
    quota_groups: QuotaGroupTable,
    config_path: PathBuf,
}

impl FallbackEngine {
    pub fn new(config: FallbackConfig, config_path: PathBuf, quota_groups: QuotaGroupTable) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
            runtime: RwLock::new(HashMap::new()),
            quota_groups,
            config_path,
        }
    }

    /// Reads `fallback.json` if present; an absent file is an empty,
    /// valid configuration (first boot).
    pub async fn load_config(path: &Path) -> RoutingResult<FallbackConfig> {
        match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|err| RoutingError::Storage(format!("corrupt fallback.json: {err}"))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(FallbackConfig::default()),
            Err(err) => Err(RoutingError::Storage(err.to_string())),
        }
    }

    pub async fn save(&self, config: FallbackConfig) -> RoutingResult<()> {
        atomic_write_json(&self.config_path, &config)
            .await
            .map_err(|err| RoutingError::Storage(err.to_string()))?;
        self.config.store(std::sync::Arc::new(config));
        Ok(())
    }

    pub fn config(&self) -> std::sync::Arc<FallbackConfig> {
        self.config.load_full()
    }

    /// The ordered chain of entries to try for `virtual_model`, or a
    /// single-entry chain of the detected `(provider, model)` when no
    /// enabled virtual model matches.
    pub async fn resolve_chain(
        &self,
        virtual_model: &str,
        detected_provider: Provider,
        detected_model: &str,
        now: OffsetDateTime,
    ) -> Vec<FallbackEntry> {
        let config = self.config.load_full();
        let Some(vm) = config
            .virtual_models
            .iter()
            .find(|vm| vm.name == virtual_model && vm.is_enabled)
        else {
            return vec![FallbackEntry {
                provider: detected_provider,
                model_id: detected_model.to_string(),
                priority: 1,
            }];
        };

        let runtime = self.runtime.read().await;
        let states: Vec<EntryRuntimeState> = vm
            .entries
            .iter()
            .map(|e| {
                let key = (vm.name.clone(), e.provider, e.model_id.clone());
                runtime.get(&key).cloned().unwrap_or_default()
            })
            .collect();
        drop(runtime);

        let live: Vec<(usize, &FallbackEntry)> = vm
            .entries
            .iter()
            .enumerate()
            .filter(|(i, _)| !states[*i].is_cooling(now))
            .collect();

        if live.is_empty() {
            return Vec::new();
        }

        let candidates: Vec<EntryCandidate> = live
            .iter()
            .map(|(i, entry)| EntryCandidate { entry, state: &states[*i] })
            .collect();
        let order = rank_indices(&candidates, vm.strategy);
        order.into_iter().map(|i| live[i].1.clone()).collect()
    }

    /// Bump usage, nudge the success-rate moving average up, clear
    /// cooldown, reset the escalation counter.
    pub async fn record_success(&self, virtual_model: &str, provider: Provider, model_id: &str, now: OffsetDateTime) {
        let mut runtime = self.runtime.write().await;
        let key = (virtual_model.to_string(), provider, model_id.to_string());
        let state = runtime.entry(key).or_default();
        state.usage_count += 1;
        state.success_rate = ema(state.success_rate, 1.0);
        state.last_used = Some(now);
        state.cooldown_until = None;
        state.escalation_step = 0;
    }

    /// Bump usage, nudge the success-rate moving average down. An entry
    /// enters cooldown once it has at least 3 uses and a success rate
    /// below 0.5, using the same escalating schedule as credential quota
    /// cooldowns.
    pub async fn record_failure(&self, virtual_model: &str, provider: Provider, model_id: &str, now: OffsetDateTime) {
        let mut runtime = self.runtime.write().await;
        let key = (virtual_model.to_string(), provider, model_id.to_string());
        let state = runtime.entry(key).or_default();
        state.usage_count += 1;
        state.success_rate = ema(state.success_rate, 0.0);
        state.last_used = Some(now);

        if state.usage_count >= 3 && state.success_rate < 0.5 {
            state.cooldown_until = Some(now + time::Duration::seconds(escalate_cooldown_secs(state.escalation_step)));
            state.escalation_step += 1;
        }
    }

    /// Cooldowns induced by quota-exceeded apply to every member of the
    /// group: escalates the triggering entry and every group sibling,
    /// across every virtual model that happens to configure that
    /// sibling `(provider, model)` pair.
    pub async fn record_quota_exceeded(&self, provider: Provider, model_id: &str, now: OffsetDateTime) {
        let targets = self.quota_groups.debit_targets(provider, model_id);
        let config = self.config.load_full();
        let mut runtime = self.runtime.write().await;

        for vm in &config.virtual_models {
            for entry in &vm.entries {
                if !targets.iter().any(|(p, m)| *p == entry.provider && m == &entry.model_id) {
                    continue;
                }
                let key = (vm.name.clone(), entry.provider, entry.model_id.clone());
                let state = runtime.entry(key).or_default();
                state.usage_count += 1;
                state.cooldown_until =
                    Some(now + time::Duration::seconds(escalate_cooldown_secs(state.escalation_step)));
                state.escalation_step += 1;
            }
        }
    }

    pub fn list_virtual_models(&self) -> Vec<VirtualModel> {
        self.config.load_full().virtual_models.clone()
    }

    pub fn get_virtual_model(&self, name: &str) -> RoutingResult<VirtualModel> {
        self.config
            .load_full()
            .virtual_models
            .iter()
            .find(|vm| vm.name == name)
            .cloned()
            .ok_or_else(|| RoutingError::UnknownVirtualModel(name.to_string()))
    }

    /// Replaces the virtual model named `vm.name` if one exists, else
    /// appends it.
    pub async fn upsert_virtual_model(&self, vm: VirtualModel) -> RoutingResult<()> {
        let mut config = (*self.config.load_full()).clone();
        match config.virtual_models.iter_mut().find(|existing| existing.name == vm.name) {
            Some(slot) => *slot = vm,
            None => config.virtual_models.push(vm),
        }
        self.save(config).await
    }

    pub async fn delete_virtual_model(&self, name: &str) -> RoutingResult<()> {
        let mut config = (*self.config.load_full()).clone();
        let before = config.virtual_models.len();
        config.virtual_models.retain(|vm| vm.name != name);
        if config.virtual_models.len() == before {
            return Err(RoutingError::UnknownVirtualModel(name.to_string()));
        }
        self.save(config).await
    }

    pub async fn set_enabled(&self, name: &str, enabled: bool) -> RoutingResult<()> {
        let mut config = (*self.config.load_full()).clone();
        let vm = config
            .virtual_models
            .iter_mut()
            .find(|vm| vm.name == name)
            .ok_or_else(|| RoutingError::UnknownVirtualModel(name.to_string()))?;
        vm.is_enabled = enabled;
        self.save(config).await
    }

    pub async fn add_entry(&self, name: &str, entry: FallbackEntry) -> RoutingResult<()> {
        let mut config = (*self.config.load_full()).clone();
        let vm = config
            .virtual_models
            .iter_mut()
            .find(|vm| vm.name == name)
            .ok_or_else(|| RoutingError::UnknownVirtualModel(name.to_string()))?;
        vm.entries.push(entry);
        self.save(config).await
    }

    /// Removes the entry for `(provider, model_id)` from virtual model
    /// `name`. Returns an error if either the virtual model or the
    /// entry within it doesn't exist.
    pub async fn remove_entry(&self, name: &str, provider: Provider, model_id: &str) -> RoutingResult<()> {
        let mut config = (*self.config.load_full()).clone();
        let vm = config
            .virtual_models
            .iter_mut()
            .find(|vm| vm.name == name)
            .ok_or_else(|| RoutingError::UnknownVirtualModel(name.to_string()))?;
        let before = vm.entries.len();
        vm.entries.retain(|e| !(e.provider == provider && e.model_id == model_id));
        if vm.entries.len() == before {
            return Err(RoutingError::UnknownVirtualModel(format!("{name}: no entry for {provider} {model_id}")));
        }
        self.save(config).await
    }
}

/// Bounded moving average; success rate always stays in [0,1].
fn ema(current: f64, outcome: f64) -> f64 {
    const ALPHA: f64 = 0.3;
    (current + ALPHA * (outcome - current)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(provider: Provider, model: &str, priority: u8) -> FallbackEntry {
        FallbackEntry { provider, model_id: model.to_string(), priority }
    }

    fn engine(config: FallbackConfig, dir: &Path) -> FallbackEngine {
        FallbackEngine::new(config, dir.join("fallback.json"), QuotaGroupTable::default_table())
    }

    #[tokio::test]
    async fn no_matching_virtual_model_falls_back_to_single_entry_chain() {
        let dir = tempfile::tempdir().unwrap();
        let eng = engine(FallbackConfig::default(), dir.path());
        let chain = eng
            .resolve_chain("nope", Provider::Claude, "claude-haiku-4", OffsetDateTime::now_utc())
            .await;
        assert_eq!(chain, vec![entry(Provider::Claude, "claude-haiku-4", 1)]);
    }

    #[tokio::test]
    async fn disabled_virtual_model_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let config = FallbackConfig {
            virtual_models: vec![VirtualModel {
                name: "smart".to_string(),
                is_enabled: false,
                strategy: Strategy::FillFirst,
                entries: vec![entry(Provider::Claude, "claude-opus-4", 1)],
            }],
        };
        let eng = engine(config, dir.path());
        let chain = eng
            .resolve_chain("smart", Provider::Codex, "gpt-4o", OffsetDateTime::now_utc())
            .await;
        assert_eq!(chain, vec![entry(Provider::Codex, "gpt-4o", 1)]);
    }

    #[tokio::test]
    async fn cooling_entry_is_dropped_from_the_chain() {
        let dir = tempfile::tempdir().unwrap();
        let config = FallbackConfig {
            virtual_models: vec![VirtualModel {
                name: "smart".to_string(),
                is_enabled: true,
                strategy: Strategy::RoundRobin,
                entries: vec![
                    entry(Provider::Claude, "claude-opus-4", 1),
                    entry(Provider::Codex, "gpt-4o", 2),
                ],
            }],
        };
        let eng = engine(config, dir.path());
        let now = OffsetDateTime::now_utc();
        for _ in 0..3 {
            eng.record_failure("smart", Provider::Claude, "claude-opus-4", now).await;
        }

        let chain = eng.resolve_chain("smart", Provider::Claude, "claude-opus-4", now).await;
        assert_eq!(chain, vec![entry(Provider::Codex, "gpt-4o", 2)]);
    }

    #[tokio::test]
    async fn three_failures_below_half_success_rate_trigger_cooldown() {
        let dir = tempfile::tempdir().unwrap();
        let eng = engine(FallbackConfig::default(), dir.path());
        let now = OffsetDateTime::now_utc();
        eng.record_failure("vm", Provider::Claude, "m", now).await;
        eng.record_failure("vm", Provider::Claude, "m", now).await;
        eng.record_failure("vm", Provider::Claude, "m", now).await;

        let runtime = eng.runtime.read().await;
        let key = ("vm".to_string(), Provider::Claude, "m".to_string());
        let state = runtime.get(&key).unwrap();
        assert!(state.cooldown_until.unwrap() > now);
    }

    #[tokio::test]
    async fn quota_exceeded_propagates_to_group_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let config = FallbackConfig {
            virtual_models: vec![VirtualModel {
                name: "smart".to_string(),
                is_enabled: true,
                strategy: Strategy::FillFirst,
                entries: vec![
                    entry(Provider::Vertex, "gemini-1.5-pro", 1),
                    entry(Provider::GeminiCli, "gemini-1.5-pro", 2),
                ],
            }],
        };
        let eng = engine(config, dir.path());
        let now = OffsetDateTime::now_utc();
        eng.record_quota_exceeded(Provider::Vertex, "gemini-1.5-pro", now).await;

        let chain = eng.resolve_chain("smart", Provider::Vertex, "gemini-1.5-pro", now).await;
        assert!(chain.is_empty());
    }

    #[tokio::test]
    async fn save_persists_and_updates_the_loaded_config() {
        let dir = tempfile::tempdir().unwrap();
        let eng = engine(FallbackConfig::default(), dir.path());
        let config = FallbackConfig {
            virtual_models: vec![VirtualModel {
                name: "smart".to_string(),
                is_enabled: true,
                strategy: Strategy::FillFirst,
                entries: vec![entry(Provider::Claude, "claude-opus-4", 1)],
            }],
        };
        eng.save(config.clone()).await.unwrap();
        assert_eq!(eng.config().virtual_models.len(), 1);

        let reloaded = FallbackEngine::load_config(&dir.path().join("fallback.json")).await.unwrap();
        assert_eq!(reloaded.virtual_models[0].name, "smart");
    }
}
