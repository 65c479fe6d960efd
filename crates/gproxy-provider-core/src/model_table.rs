use gproxy_common::Tier;

/// One row of the static model-requirements table.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequirement {
    /// Matched as a prefix against the requested model id.
    pub prefix: &'static str,
    /// `None` means no tier restriction, any credential tier is eligible.
    pub minimum_tier: Option<Tier>,
    /// When set, candidates of this tier are stable-sorted first.
    pub preferred_tier: Option<Tier>,
}

#[derive(Debug, Clone)]
pub struct ModelTierTable {
    rows: Vec<ModelRequirement>,
}

impl ModelTierTable {
    pub fn new(rows: Vec<ModelRequirement>) -> Self {
        Self { rows }
    }

    /// A representative table: long-context / high-capability model
    /// families require a paid plan, everything else is unrestricted.
    pub fn default_table() -> Self {
        Self::new(vec![
            ModelRequirement {
                prefix: "claude-opus",
                minimum_tier: Some(Tier::Paid),
                preferred_tier: Some(Tier::Paid),
            },
            ModelRequirement {
                prefix: "gpt-4",
                minimum_tier: Some(Tier::Paid),
                preferred_tier: Some(Tier::Paid),
            },
            ModelRequirement {
                prefix: "gemini-1.5-pro",
                minimum_tier: Some(Tier::Paid),
                preferred_tier: Some(Tier::Paid),
            },
        ])
    }

    fn row_for(&self, model: &str) -> Option<&ModelRequirement> {
        self.rows.iter().find(|row| model.starts_with(row.prefix))
    }

    pub fn minimum_tier(&self, model: &str) -> Option<Tier> {
        self.row_for(model).and_then(|row| row.minimum_tier)
    }

    pub fn preferred_tier(&self, model: &str) -> Option<Tier> {
        self.row_for(model).and_then(|row| row.preferred_tier)
    }

    /// Models requiring paid exclude free credentials, but an unknown
    /// tier is still permitted through.
    pub fn tier_is_eligible(&self, model: &str, tier: Tier) -> bool {
        match self.minimum_tier(model) {
            Some(Tier::Paid) => tier != Tier::Free,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paid_model_excludes_free_but_permits_unknown() {
        let table = ModelTierTable::default_table();
        assert!(!table.tier_is_eligible("claude-opus-4", Tier::Free));
        assert!(table.tier_is_eligible("claude-opus-4", Tier::Unknown));
        assert!(table.tier_is_eligible("claude-opus-4", Tier::Paid));
    }

    #[test]
    fn unrestricted_model_permits_every_tier() {
        let table = ModelTierTable::default_table();
        assert!(table.tier_is_eligible("claude-haiku-4", Tier::Free));
    }
}
