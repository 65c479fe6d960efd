//! Provider-facing abstractions shared by every concrete handler in
//! `gproxy-providers`: the three capability traits, the registry that
//! dispatches a `Provider` discriminant to its handlers, and the two
//! static tables the router consults: model tier requirements and
//! quota-group membership.

mod capability;
mod errors;
mod model_table;
mod quota_group;
mod registry;

pub use capability::{
    DeviceCodeCapable, DeviceFlowStart, DevicePollOutcome, OAuthCapable, OAuthStart,
    ServiceAccountCapable,
};
pub use errors::{ProviderError, ProviderResult};
pub use model_table::{ModelRequirement, ModelTierTable};
pub use quota_group::{QuotaGroup, QuotaGroupTable};
pub use registry::ProviderRegistry;
