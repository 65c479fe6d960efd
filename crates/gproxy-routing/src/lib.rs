//! Credential selection and virtual-model fallback.
//!
//! The Router ([`Router`]) is pure given its inputs, a candidate list
//! plus the current time, so its three strategies are unit-testable
//! without I/O. The Fallback Engine ([`fallback::FallbackEngine`]) owns
//! virtual-model configuration and the per-entry usage/success-rate
//! counters that decide when an entry falls out of rotation.

mod candidate;
mod errors;
mod fallback;
mod router;

pub use candidate::{escalate_cooldown_secs, rank_indices, select_by_strategy, Candidate, COOLDOWN_SCHEDULE_SECS};
pub use errors::{RoutingError, RoutingResult};
pub use fallback::{EntryRuntimeState, FallbackConfig, FallbackEngine, FallbackEntry, VirtualModel};
pub use router::Router;
