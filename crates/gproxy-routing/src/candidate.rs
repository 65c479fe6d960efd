use gproxy_common::Strategy;
use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;

/// Anything the three selection strategies can choose between: a
/// credential for the router, or a fallback entry for the fallback
/// engine. Selection never looks at tier or cooldown directly; callers
/// filter those out before calling [`select_by_strategy`].
pub trait Candidate {
    fn usage_count(&self) -> u64;
    fn success_rate(&self) -> f64;
    /// 1-10, lower is higher priority.
    fn priority(&self) -> u8;
    /// `None` when the candidate kind has no notion of quota (fallback
    /// entries); `Some(true)`/`Some(false)` otherwise.
    fn has_quota_remaining(&self) -> Option<bool>;
    /// Usage-frequency bucket feeding `smartPriority`'s `freq` term.
    fn freq_score(&self) -> f64;
}

impl<T: Candidate> Candidate for &T {
    fn usage_count(&self) -> u64 {
        (**self).usage_count()
    }
    fn success_rate(&self) -> f64 {
        (**self).success_rate()
    }
    fn priority(&self) -> u8 {
        (**self).priority()
    }
    fn has_quota_remaining(&self) -> Option<bool> {
        (**self).has_quota_remaining()
    }
    fn freq_score(&self) -> f64 {
        (**self).freq_score()
    }
}

/// The five cooldown escalation steps, clamped at the last one for any
/// step beyond the table's length.
pub const COOLDOWN_SCHEDULE_SECS: [i64; 5] = [10, 30, 60, 120, 300];

pub fn escalate_cooldown_secs(step: u32) -> i64 {
    let idx = (step as usize).min(COOLDOWN_SCHEDULE_SECS.len() - 1);
    COOLDOWN_SCHEDULE_SECS[idx]
}

/// Picks the index of the winning candidate among already tier-filtered,
/// non-cooled-down candidates. Returns `None` only when `candidates` is
/// empty.
pub fn select_by_strategy<C: Candidate>(
    candidates: &[C],
    strategy: Strategy,
    tau: u32,
) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }

    match strategy {
        Strategy::FillFirst => Some(
            candidates
                .iter()
                .position(|c| c.has_quota_remaining() == Some(true))
                .unwrap_or(0),
        ),
        Strategy::RoundRobin => Some(round_robin_index(candidates, tau)),
        Strategy::SmartPriority => Some(smart_priority_index(candidates)),
    }
}

fn round_robin_index<C: Candidate>(candidates: &[C], tau: u32) -> usize {
    if tau == 0 {
        return candidates
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| c.usage_count())
            .map(|(i, _)| i)
            .unwrap_or(0);
    }

    let max_u = candidates.iter().map(|c| c.usage_count()).max().unwrap_or(0);
    let weights: Vec<u64> = candidates
        .iter()
        .map(|c| (max_u - c.usage_count()) + tau as u64 + 1)
        .collect();

    let Ok(dist) = WeightedIndex::new(&weights) else {
        return 0;
    };
    let mut rng = rand::thread_rng();
    dist.sample(&mut rng)
}

fn smart_priority_index<C: Candidate>(candidates: &[C]) -> usize {
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (i, smart_priority_score(c)))
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn smart_priority_score<C: Candidate>(c: &C) -> f64 {
    let priority_term = 1.0 - ((c.priority().max(1) as f64 - 1.0) / 10.0);
    0.4 * c.freq_score() + 0.4 * priority_term + 0.2 * c.success_rate()
}

/// Unlike [`select_by_strategy`] (one winner, randomized for weighted
/// `roundRobin`), this orders every candidate deterministically. Used by
/// the fallback engine to build the whole chain it will try in sequence.
pub fn rank_indices<C: Candidate>(candidates: &[C], strategy: Strategy) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..candidates.len()).collect();
    match strategy {
        Strategy::FillFirst => {}
        Strategy::RoundRobin => idx.sort_by_key(|&i| candidates[i].usage_count()),
        Strategy::SmartPriority => idx.sort_by(|&a, &b| {
            smart_priority_score(&candidates[b])
                .partial_cmp(&smart_priority_score(&candidates[a]))
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fake {
        usage: u64,
        success_rate: f64,
        priority: u8,
        quota_remaining: Option<bool>,
        freq: f64,
    }

    impl Candidate for Fake {
        fn usage_count(&self) -> u64 {
            self.usage
        }
        fn success_rate(&self) -> f64 {
            self.success_rate
        }
        fn priority(&self) -> u8 {
            self.priority
        }
        fn has_quota_remaining(&self) -> Option<bool> {
            self.quota_remaining
        }
        fn freq_score(&self) -> f64 {
            self.freq
        }
    }

    fn fake(usage: u64, quota_remaining: Option<bool>) -> Fake {
        Fake {
            usage,
            success_rate: 1.0,
            priority: 1,
            quota_remaining,
            freq: 1.0,
        }
    }

    #[test]
    fn fill_first_picks_first_with_quota_remaining() {
        let candidates = vec![fake(0, Some(false)), fake(0, Some(true)), fake(0, Some(false))];
        assert_eq!(select_by_strategy(&candidates, Strategy::FillFirst, 0), Some(1));
    }

    #[test]
    fn fill_first_falls_back_to_first_when_none_report_quota() {
        let candidates = vec![fake(0, None), fake(0, None)];
        assert_eq!(select_by_strategy(&candidates, Strategy::FillFirst, 0), Some(0));
    }

    #[test]
    fn round_robin_zero_tolerance_picks_lowest_usage_deterministically() {
        let candidates = vec![fake(5, None), fake(2, None), fake(2, None)];
        assert_eq!(select_by_strategy(&candidates, Strategy::RoundRobin, 0), Some(1));
    }

    #[test]
    fn smart_priority_prefers_higher_success_rate_at_equal_priority_and_freq() {
        let candidates = vec![
            Fake { usage: 0, success_rate: 0.2, priority: 1, quota_remaining: None, freq: 1.0 },
            Fake { usage: 0, success_rate: 0.9, priority: 1, quota_remaining: None, freq: 1.0 },
        ];
        assert_eq!(select_by_strategy(&candidates, Strategy::SmartPriority, 0), Some(1));
    }

    #[test]
    fn rank_indices_orders_round_robin_by_ascending_usage() {
        let candidates = vec![fake(5, None), fake(1, None), fake(3, None)];
        assert_eq!(rank_indices(&candidates, Strategy::RoundRobin), vec![1, 2, 0]);
    }

    #[test]
    fn rank_indices_fill_first_keeps_original_order() {
        let candidates = vec![fake(9, None), fake(0, None)];
        assert_eq!(rank_indices(&candidates, Strategy::FillFirst), vec![0, 1]);
    }

    #[test]
    fn escalation_clamps_at_the_final_step() {
        assert_eq!(escalate_cooldown_secs(0), 10);
        assert_eq!(escalate_cooldown_secs(4), 300);
        assert_eq!(escalate_cooldown_secs(99), 300);
    }
}
