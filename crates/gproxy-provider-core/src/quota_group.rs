use gproxy_common::Provider;

/// A named set of `(provider, model)` pairs that consume one shared
/// upstream quota. A debit on any member debits all.
#[derive(Debug, Clone)]
pub struct QuotaGroup {
    pub name: &'static str,
    pub members: Vec<(Provider, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct QuotaGroupTable {
    groups: Vec<QuotaGroup>,
}

impl QuotaGroupTable {
    pub fn new(groups: Vec<QuotaGroup>) -> Self {
        Self { groups }
    }

    /// Vertex and the Gemini CLI share Google's per-project Gemini quota
    /// when pointed at the same model family.
    pub fn default_table() -> Self {
        Self::new(vec![QuotaGroup {
            name: "google-gemini-pro",
            members: vec![
                (Provider::Vertex, "gemini-1.5-pro".to_string()),
                (Provider::GeminiCli, "gemini-1.5-pro".to_string()),
            ],
        }])
    }

    pub fn group_for(&self, provider: Provider, model: &str) -> Option<&QuotaGroup> {
        self.groups
            .iter()
            .find(|g| g.members.iter().any(|(p, m)| *p == provider && m == model))
    }

    /// Every member of the group containing `(provider, model)`,
    /// including the pair itself, or just that pair if it belongs to
    /// no group.
    pub fn debit_targets(&self, provider: Provider, model: &str) -> Vec<(Provider, String)> {
        match self.group_for(provider, model) {
            Some(group) => group.members.clone(),
            None => vec![(provider, model.to_string())],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debit_propagates_to_every_group_member() {
        let table = QuotaGroupTable::default_table();
        let targets = table.debit_targets(Provider::Vertex, "gemini-1.5-pro");
        assert_eq!(targets.len(), 2);
        assert!(targets.contains(&(Provider::GeminiCli, "gemini-1.5-pro".to_string())));
    }

    #[test]
    fn ungrouped_pair_debits_only_itself() {
        let table = QuotaGroupTable::default_table();
        let targets = table.debit_targets(Provider::Claude, "claude-opus-4");
        assert_eq!(targets, vec![(Provider::Claude, "claude-opus-4".to_string())]);
    }
}
