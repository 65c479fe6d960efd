//! Bidirectional conversion of request bodies and streamed chunks
//! between the three client-facing protocols.
//!
//! Every protocol's typed request/response is first folded into a small
//! canonical representation (`canonical`), then unfolded into the target
//! protocol's shape. This is how the nine request-translation functions
//! and nine stream adapters across three protocols avoid duplicating the
//! same field mapping six times over: the canonical hop is the shared
//! implementation the pairwise API composes through.

mod canonical;
mod error;
mod request;
mod response;
mod stop_reason;
mod stream;

pub use canonical::{
    CanonicalContent, CanonicalMessage, CanonicalRequest, CanonicalRole, CanonicalTool,
};
pub use error::TranslationError;
pub use request::{translate_request, Proto, Request};
pub use response::{translate_response, Response};
pub use stop_reason::CanonicalStopReason;
pub use stream::{translate_stream_event, ClientFrame, StreamTranslator};
