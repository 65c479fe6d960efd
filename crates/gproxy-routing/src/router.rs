use gproxy_common::Strategy;
use gproxy_provider_core::ModelTierTable;
use gproxy_storage::CredentialRecord;
use time::OffsetDateTime;

use crate::candidate::{escalate_cooldown_secs, select_by_strategy, Candidate};

/// Credential records have no per-credential `priority`/`successRate`
/// fields of their own (those live on fallback entries), so `usageCount`
/// and `freq` are read off the quota counters that do exist: `quotaUsed`
/// stands in for usage count, and remaining-quota fraction stands in
/// for `smartPriority`'s `freq` term.
impl Candidate for CredentialRecord {
    fn usage_count(&self) -> u64 {
        self.quota_used.unwrap_or(0)
    }

    fn success_rate(&self) -> f64 {
        1.0
    }

    fn priority(&self) -> u8 {
        1
    }

    fn has_quota_remaining(&self) -> Option<bool> {
        match (self.quota_used, self.quota_limit) {
            (Some(used), Some(limit)) => Some(used < limit),
            _ => None,
        }
    }

    fn freq_score(&self) -> f64 {
        let Some(limit) = self.quota_limit.filter(|l| *l > 0) else {
            return 1.0;
        };
        let used = self.quota_used.unwrap_or(0);
        let remaining = 1.0 - (used as f64 / limit as f64).min(1.0);
        if remaining >= 0.75 {
            1.0
        } else if remaining >= 0.5 {
            0.75
        } else if remaining >= 0.25 {
            0.50
        } else if remaining > 0.0 {
            0.25
        } else {
            0.10
        }
    }
}

/// Credential selection. Pure given its inputs: every method takes the
/// candidate set and the current time and returns a decision or an
/// updated record, with no I/O of its own. The caller persists whatever
/// it returns through the credential store.
#[derive(Debug, Clone)]
pub struct Router {
    model_table: ModelTierTable,
}

impl Router {
    pub fn new(model_table: ModelTierTable) -> Self {
        Self { model_table }
    }

    /// Tier filter, preferred-tier reorder, cooldown drop, then strategy
    /// selection.
    pub fn select<'a>(
        &self,
        candidates: &'a [CredentialRecord],
        model: &str,
        strategy: Strategy,
        tau: u32,
        now: OffsetDateTime,
    ) -> Option<&'a CredentialRecord> {
        let mut eligible: Vec<&CredentialRecord> = candidates
            .iter()
            .filter(|c| c.is_selection_eligible(now))
            .filter(|c| self.model_table.tier_is_eligible(model, c.tier))
            .collect();

        if let Some(preferred) = self.model_table.preferred_tier(model) {
            eligible.sort_by_key(|c| c.tier != preferred);
        }

        if eligible.is_empty() {
            return None;
        }

        let idx = select_by_strategy(&eligible, strategy, tau)?;
        Some(eligible[idx])
    }

    /// On an upstream 401/invalid-credential: sticky `error` status, no
    /// rotation within the same request.
    pub fn apply_auth_error(&self, record: &CredentialRecord, message: impl Into<String>) -> CredentialRecord {
        let mut updated = record.clone();
        updated.status = gproxy_storage::CredentialStatus::Error;
        updated.status_message = Some(message.into());
        updated.updated_at = OffsetDateTime::now_utc();
        updated
    }

    /// On an upstream 429: escalating cooldown. `step` is the
    /// caller-tracked consecutive-escalation counter for this credential,
    /// 0 on the first quota-exceeded event since the last success.
    pub fn apply_quota_exceeded(
        &self,
        record: &CredentialRecord,
        step: u32,
        reason: impl Into<String>,
        now: OffsetDateTime,
    ) -> CredentialRecord {
        let mut updated = record.clone();
        updated.status = gproxy_storage::CredentialStatus::Cooling;
        updated.cooldown_until = Some(now + time::Duration::seconds(escalate_cooldown_secs(step)));
        updated.cooldown_reason = Some(reason.into());
        updated.updated_at = now;
        updated
    }

    /// A successful call clears any cooldown and resets the escalation
    /// counter (tracked by the caller) back to zero.
    pub fn apply_success(&self, record: &CredentialRecord, quota_used_delta: u64) -> CredentialRecord {
        let mut updated = record.clone();
        updated.status = gproxy_storage::CredentialStatus::Ready;
        updated.status_message = None;
        updated.cooldown_until = None;
        updated.cooldown_reason = None;
        updated.quota_used = Some(updated.quota_used.unwrap_or(0) + quota_used_delta);
        updated.updated_at = OffsetDateTime::now_utc();
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gproxy_common::{Provider, Tier};
    use gproxy_storage::CredentialStatus;

    fn record(id: &str, tier: Tier, quota_used: Option<u64>, quota_limit: Option<u64>) -> CredentialRecord {
        let now = OffsetDateTime::now_utc();
        CredentialRecord {
            schema_version: 1,
            id: id.to_string(),
            provider: Provider::Claude,
            access_token: "tok".to_string(),
            refresh_token: None,
            expires_at: None,
            email: None,
            name: None,
            project_id: None,
            region: None,
            tier,
            status: CredentialStatus::Ready,
            status_message: None,
            disabled: false,
            cooldown_until: None,
            cooldown_reason: None,
            quota_used,
            quota_limit,
            quota_reset_at: None,
            token_data: None,
            service_account_json: None,
            created_at: now,
            updated_at: now,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn paid_model_excludes_free_credential() {
        let router = Router::new(ModelTierTable::default_table());
        let candidates = vec![record("free", Tier::Free, None, None), record("paid", Tier::Paid, None, None)];
        let chosen = router
            .select(&candidates, "claude-opus-4", Strategy::FillFirst, 0, OffsetDateTime::now_utc())
            .unwrap();
        assert_eq!(chosen.id, "paid");
    }

    #[test]
    fn cooled_down_credential_is_never_selected() {
        let router = Router::new(ModelTierTable::default_table());
        let now = OffsetDateTime::now_utc();
        let mut cooling = record("cooling", Tier::Unknown, None, None);
        cooling.status = CredentialStatus::Cooling;
        cooling.cooldown_until = Some(now + time::Duration::seconds(60));
        let ready = record("ready", Tier::Unknown, None, None);
        let candidates = vec![cooling, ready];
        let chosen = router.select(&candidates, "claude-haiku-4", Strategy::FillFirst, 0, now).unwrap();
        assert_eq!(chosen.id, "ready");
    }

    #[test]
    fn quota_exceeded_sets_escalating_cooldown() {
        let router = Router::new(ModelTierTable::default_table());
        let now = OffsetDateTime::now_utc();
        let rec = record("a", Tier::Unknown, None, None);
        let updated = router.apply_quota_exceeded(&rec, 2, "429", now);
        assert_eq!(updated.status, CredentialStatus::Cooling);
        assert_eq!(updated.cooldown_until.unwrap(), now + time::Duration::seconds(60));
    }

    #[test]
    fn success_clears_cooldown_and_debits_quota() {
        let router = Router::new(ModelTierTable::default_table());
        let mut rec = record("a", Tier::Unknown, Some(5), Some(10));
        rec.status = CredentialStatus::Cooling;
        rec.cooldown_until = Some(OffsetDateTime::now_utc() + time::Duration::seconds(30));
        let updated = router.apply_success(&rec, 1);
        assert_eq!(updated.status, CredentialStatus::Ready);
        assert!(updated.cooldown_until.is_none());
        assert_eq!(updated.quota_used, Some(6));
    }
}
