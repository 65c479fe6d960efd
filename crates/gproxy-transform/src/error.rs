/// An unexpected upstream chunk shape or an unrepresentable request
/// field. Logged by the caller; never propagated as a hard failure
/// mid-stream, an upstream termination without a terminal event must
/// still yield a terminal event on the client stream.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TranslationError {
    #[error("unparseable upstream chunk: {0}")]
    UnparseableChunk(String),
    #[error("unsupported source/target protocol pair")]
    UnsupportedPair,
    #[error("malformed request body: {0}")]
    MalformedRequest(String),
}
