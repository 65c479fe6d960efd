#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("session error: {0}")]
    Session(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;
