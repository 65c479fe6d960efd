//! OpenAI-shaped chat-completions request/response/stream types, as
//! accepted on `POST /v1/chat/completions`.

pub mod request;
pub mod response;
pub mod stream;

pub use request::{
    ChatCompletionRequest, ChatMessage, ContentPart, FunctionCall, FunctionSpec, MessageContent,
    ToolCall, ToolSpec,
};
pub use response::{ChatChoice, ChatCompletionResponse, ResponseMessage, Usage};
pub use stream::{ChatCompletionChunk, ChunkChoice, ChunkDelta, ChunkFunctionCall, ChunkToolCall};
