#[derive(Debug, Clone, thiserror::Error)]
pub enum RoutingError {
    #[error("no eligible candidates")]
    NoEligibleCandidates,
    #[error("unknown virtual model: {0}")]
    UnknownVirtualModel(String),
    #[error("storage error: {0}")]
    Storage(String),
}

pub type RoutingResult<T> = Result<T, RoutingError>;
