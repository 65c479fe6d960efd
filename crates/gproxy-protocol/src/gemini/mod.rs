//! Gemini generateContent request/response/stream types, as accepted on
//! `POST /v1beta/models/{model}:generateContent` and
//! `:streamGenerateContent`.

pub mod request;
pub mod response;

pub use request::{
    Content, FunctionCallPart, FunctionDeclaration, FunctionResponsePart, GenerateContentRequest,
    GenerationConfig, Part, Role, Tool,
};
pub use response::{Candidate, FinishReason, GenerateContentResponse, UsageMetadata};
