use std::collections::{HashMap, VecDeque};

use gproxy_common::Provider;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// One inference attempt's outcome. There is no persistence engine
/// beyond the credential/fallback JSON files, so this is an in-memory
/// ring buffer that resets on restart rather than a durable log.
#[derive(Debug, Clone, Serialize)]
pub struct RequestLogEntry {
    pub id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
    pub virtual_model: String,
    pub provider: Provider,
    pub model_id: String,
    pub outcome: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct RequestStats {
    pub total: u64,
    pub ok: u64,
    pub error: u64,
    pub by_provider: HashMap<Provider, u64>,
}

/// Bounded ring buffer of recent inference attempts, oldest evicted
/// first once `capacity` is reached.
pub struct RequestLog {
    entries: RwLock<VecDeque<RequestLogEntry>>,
    capacity: usize,
}

impl RequestLog {
    pub fn new(capacity: usize) -> Self {
        Self { entries: RwLock::new(VecDeque::with_capacity(capacity)), capacity }
    }

    pub async fn push(&self, entry: RequestLogEntry) {
        let mut entries = self.entries.write().await;
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub async fn snapshot(&self) -> Vec<RequestLogEntry> {
        self.entries.read().await.iter().cloned().collect()
    }

    pub async fn stats(&self) -> RequestStats {
        let entries = self.entries.read().await;
        let mut stats = RequestStats::default();
        for entry in entries.iter() {
            stats.total += 1;
            if entry.outcome == "ok" {
                stats.ok += 1;
            } else {
                stats.error += 1;
            }
            *stats.by_provider.entry(entry.provider).or_insert(0) += 1;
        }
        stats
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(outcome: &str) -> RequestLogEntry {
        RequestLogEntry {
            id: "1".to_string(),
            at: OffsetDateTime::now_utc(),
            virtual_model: "smart".to_string(),
            provider: Provider::Claude,
            model_id: "claude-opus-4".to_string(),
            outcome: outcome.to_string(),
        }
    }

    #[tokio::test]
    async fn evicts_oldest_once_capacity_is_reached() {
        let log = RequestLog::new(2);
        log.push(entry("ok")).await;
        log.push(entry("ok")).await;
        log.push(entry("error")).await;
        assert_eq!(log.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn stats_counts_ok_and_error_separately() {
        let log = RequestLog::new(10);
        log.push(entry("ok")).await;
        log.push(entry("ok")).await;
        log.push(entry("error")).await;
        let stats = log.stats().await;
        assert_eq!(stats.total, 3);
        assert_eq!(stats.ok, 2);
        assert_eq!(stats.error, 1);
        assert_eq!(stats.by_provider[&Provider::Claude], 3);
    }

    #[tokio::test]
    async fn clear_empties_the_log() {
        let log = RequestLog::new(10);
        log.push(entry("ok")).await;
        log.clear().await;
        assert!(log.snapshot().await.is_empty());
    }
}
