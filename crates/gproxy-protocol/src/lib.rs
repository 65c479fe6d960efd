//! Wire types for the three client-facing protocols this gateway speaks:
//! OpenAI chat-completions, Anthropic Messages, and Gemini generateContent.
//! Each module is a faithful rendition of the upstream's documented JSON
//! schema; nothing here knows about credentials, routing, or translation,
//! that lives in `gproxy-transform`.

pub mod anthropic;
pub mod gemini;
pub mod models;
pub mod openai;
pub mod sse;

pub use sse::{SseEvent, SseParser};
