use serde_json::Value;

/// Protocol-agnostic request shape every translation hops through:
/// role sequence, multi-part content, tool specs, sampling params, stop
/// sequences, streaming flag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalRequest {
    pub system: Option<String>,
    pub messages: Vec<CanonicalMessage>,
    pub tools: Vec<CanonicalTool>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub stop: Vec<String>,
    pub stream: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalMessage {
    pub role: CanonicalRole,
    pub content: Vec<CanonicalContent>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalContent {
    Text(String),
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Option<Value>,
        is_error: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTool {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Option<Value>,
}

mod from_openai;
mod from_anthropic;
mod from_gemini;

pub use from_anthropic::{anthropic_to_canonical, canonical_to_anthropic};
pub use from_gemini::{canonical_to_gemini, gemini_to_canonical};
pub use from_openai::{canonical_to_openai, openai_to_canonical};
