use gproxy_protocol::anthropic::{ContentBlock, MessagesResponse, Usage as AnthropicUsage};
use gproxy_protocol::gemini::{Candidate, GenerateContentResponse, Part, UsageMetadata};
use gproxy_protocol::openai::{ChatChoice, ChatCompletionResponse, ResponseMessage, Usage as OpenAiUsage};

use crate::error::TranslationError;
use crate::request::Proto;
use crate::stop_reason::CanonicalStopReason;

/// A complete (non-streamed) response body tagged with its protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    OpenAiChat(ChatCompletionResponse),
    Anthropic(MessagesResponse),
    Gemini(GenerateContentResponse),
}

impl Response {
    pub fn proto(&self) -> Proto {
        match self {
            Response::OpenAiChat(_) => Proto::OpenAiChat,
            Response::Anthropic(_) => Proto::Anthropic,
            Response::Gemini(_) => Proto::Gemini,
        }
    }
}

/// The first candidate's text, stop reason, and token usage: enough to
/// round-trip a single-turn, text-only completion across protocols. Tool
/// calls in the first candidate are preserved as a flat name/arguments
/// pair; additional candidates/choices beyond the first are dropped, same
/// as the streaming path only tracks one content block at a time.
struct CanonicalResponse {
    text: String,
    tool_call: Option<(String, String)>,
    stop_reason: CanonicalStopReason,
    input_tokens: u64,
    output_tokens: u64,
}

fn openai_to_canonical(resp: &ChatCompletionResponse) -> CanonicalResponse {
    let choice = resp.choices.first();
    let text = choice
        .and_then(|c| c.message.content.clone())
        .unwrap_or_default();
    let tool_call = choice
        .and_then(|c| c.message.tool_calls.as_ref())
        .and_then(|calls| calls.first())
        .map(|call| (call.function.name.clone(), call.function.arguments.clone()));
    let stop_reason = choice
        .and_then(|c| c.finish_reason.as_deref())
        .map(CanonicalStopReason::from_openai)
        .unwrap_or(CanonicalStopReason::Stop);
    let usage = resp.usage.as_ref();
    CanonicalResponse {
        text,
        tool_call,
        stop_reason,
        input_tokens: usage.map(|u| u.prompt_tokens).unwrap_or(0),
        output_tokens: usage.map(|u| u.completion_tokens).unwrap_or(0),
    }
}

fn canonical_to_openai(canonical: &CanonicalResponse, model: &str, id: &str, created: i64) -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: id.to_string(),
        object: "chat.completion".to_string(),
        created,
        model: model.to_string(),
        choices: vec![ChatChoice {
            index: 0,
            message: ResponseMessage {
                role: "assistant".to_string(),
                content: if canonical.text.is_empty() { None } else { Some(canonical.text.clone()) },
                tool_calls: canonical.tool_call.as_ref().map(|(name, arguments)| {
                    vec![gproxy_protocol::openai::ToolCall {
                        id: format!("call_{id}"),
                        kind: "function".to_string(),
                        function: gproxy_protocol::openai::FunctionCall {
                            name: name.clone(),
                            arguments: arguments.clone(),
                        },
                    }]
                }),
            },
            finish_reason: Some(canonical.stop_reason.to_openai().to_string()),
        }],
        usage: Some(OpenAiUsage {
            prompt_tokens: canonical.input_tokens,
            completion_tokens: canonical.output_tokens,
            total_tokens: canonical.input_tokens + canonical.output_tokens,
        }),
    }
}

fn anthropic_to_canonical(resp: &MessagesResponse) -> CanonicalResponse {
    let mut text = String::new();
    let mut tool_call = None;
    for block in &resp.content {
        match block {
            ContentBlock::Text { text: t } => text.push_str(t),
            ContentBlock::ToolUse { name, input, .. } => {
                tool_call = Some((name.clone(), input.to_string()));
            }
            ContentBlock::ToolResult { .. } => {}
        }
    }
    let stop_reason = resp
        .stop_reason
        .map(CanonicalStopReason::from_anthropic)
        .unwrap_or(CanonicalStopReason::Stop);
    CanonicalResponse {
        text,
        tool_call,
        stop_reason,
        input_tokens: resp.usage.input_tokens,
        output_tokens: resp.usage.output_tokens,
    }
}

fn canonical_to_anthropic(canonical: &CanonicalResponse, model: &str, id: &str) -> MessagesResponse {
    let mut content = Vec::new();
    if !canonical.text.is_empty() {
        content.push(ContentBlock::Text { text: canonical.text.clone() });
    }
    if let Some((name, arguments)) = &canonical.tool_call {
        content.push(ContentBlock::ToolUse {
            id: format!("toolu_{id}"),
            name: name.clone(),
            input: serde_json::from_str(arguments).unwrap_or(serde_json::Value::Null),
        });
    }
    MessagesResponse {
        id: id.to_string(),
        kind: "message".to_string(),
        role: "assistant".to_string(),
        content,
        model: model.to_string(),
        stop_reason: Some(canonical.stop_reason.to_anthropic()),
        stop_sequence: None,
        usage: AnthropicUsage {
            input_tokens: canonical.input_tokens,
            output_tokens: canonical.output_tokens,
            cache_creation_input_tokens: None,
            cache_read_input_tokens: None,
        },
    }
}

fn gemini_to_canonical(resp: &GenerateContentResponse) -> CanonicalResponse {
    let candidate = resp.candidates.first();
    let mut text = String::new();
    let mut tool_call = None;
    if let Some(candidate) = candidate {
        for part in &candidate.content.parts {
            match part {
                Part::Text { text: t } => text.push_str(t),
                Part::FunctionCall { function_call } => {
                    tool_call = Some((function_call.name.clone(), function_call.args.to_string()));
                }
                Part::FunctionResponse { .. } => {}
            }
        }
    }
    let stop_reason = candidate
        .and_then(|c| c.finish_reason)
        .map(CanonicalStopReason::from_gemini)
        .unwrap_or(CanonicalStopReason::Stop);
    let usage = resp.usage_metadata.as_ref();
    CanonicalResponse {
        text,
        tool_call,
        stop_reason,
        input_tokens: usage.map(|u| u.prompt_token_count).unwrap_or(0),
        output_tokens: usage.map(|u| u.candidates_token_count).unwrap_or(0),
    }
}

fn canonical_to_gemini(canonical: &CanonicalResponse) -> GenerateContentResponse {
    let mut parts = Vec::new();
    if !canonical.text.is_empty() {
        parts.push(Part::Text { text: canonical.text.clone() });
    }
    if let Some((name, arguments)) = &canonical.tool_call {
        parts.push(Part::FunctionCall {
            function_call: gproxy_protocol::gemini::FunctionCallPart {
                name: name.clone(),
                args: serde_json::from_str(arguments).unwrap_or(serde_json::Value::Null),
            },
        });
    }
    GenerateContentResponse {
        candidates: vec![Candidate {
            content: gproxy_protocol::gemini::Content { role: Some(gproxy_protocol::gemini::Role::Model), parts },
            finish_reason: Some(canonical.stop_reason.to_gemini()),
            index: 0,
        }],
        usage_metadata: Some(UsageMetadata {
            prompt_token_count: canonical.input_tokens,
            candidates_token_count: canonical.output_tokens,
            total_token_count: canonical.input_tokens + canonical.output_tokens,
        }),
    }
}

/// Converts a complete, non-streamed response between protocols. `model`
/// and `id` backstop the fields the source protocol doesn't carry
/// (Gemini has neither); callers pass through the request's model id and
/// a generated response id.
pub fn translate_response(resp: &Response, target: Proto, model: &str, id: &str, created: i64) -> Result<Response, TranslationError> {
    if resp.proto() == target {
        return Ok(resp.clone());
    }

    let canonical = match resp {
        Response::OpenAiChat(r) => openai_to_canonical(r),
        Response::Anthropic(r) => anthropic_to_canonical(r),
        Response::Gemini(r) => gemini_to_canonical(r),
    };

    Ok(match target {
        Proto::OpenAiChat => Response::OpenAiChat(canonical_to_openai(&canonical, model, id, created)),
        Proto::Anthropic => Response::Anthropic(canonical_to_anthropic(&canonical, model, id)),
        Proto::Gemini => Response::Gemini(canonical_to_gemini(&canonical)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gproxy_protocol::anthropic::StopReason;

    fn sample_anthropic() -> MessagesResponse {
        MessagesResponse {
            id: "msg_1".to_string(),
            kind: "message".to_string(),
            role: "assistant".to_string(),
            content: vec![ContentBlock::Text { text: "hi there".to_string() }],
            model: "claude-3".to_string(),
            stop_reason: Some(StopReason::EndTurn),
            stop_sequence: None,
            usage: AnthropicUsage { input_tokens: 10, output_tokens: 5, cache_creation_input_tokens: None, cache_read_input_tokens: None },
        }
    }

    #[test]
    fn translates_text_and_usage_to_openai() {
        let resp = Response::Anthropic(sample_anthropic());
        let openai = translate_response(&resp, Proto::OpenAiChat, "claude-3", "resp_1", 1700000000).unwrap();
        let Response::OpenAiChat(openai) = openai else { panic!("expected openai") };
        assert_eq!(openai.choices[0].message.content.as_deref(), Some("hi there"));
        assert_eq!(openai.usage.unwrap().prompt_tokens, 10);
        assert_eq!(openai.choices[0].finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn same_protocol_is_a_clone() {
        let resp = Response::Anthropic(sample_anthropic());
        let out = translate_response(&resp, Proto::Anthropic, "claude-3", "resp_1", 0).unwrap();
        assert_eq!(out, resp);
    }

    #[test]
    fn translates_to_gemini_candidate_shape() {
        let resp = Response::Anthropic(sample_anthropic());
        let gemini = translate_response(&resp, Proto::Gemini, "claude-3", "resp_1", 0).unwrap();
        let Response::Gemini(gemini) = gemini else { panic!("expected gemini") };
        assert_eq!(gemini.candidates.len(), 1);
        assert_eq!(gemini.usage_metadata.unwrap().total_token_count, 15);
    }
}
