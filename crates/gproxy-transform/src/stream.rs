use gproxy_protocol::anthropic::{ContentBlockDelta, StreamEvent as AnthropicStreamEvent};
use gproxy_protocol::gemini::GenerateContentResponse;
use gproxy_protocol::openai::{ChatCompletionChunk, ChunkChoice, ChunkDelta};
use gproxy_protocol::sse::{format_data_event, DONE_FRAME};

use crate::error::TranslationError;
use crate::request::Proto;
use crate::stop_reason::CanonicalStopReason;

/// One delta extracted from an upstream chunk, independent of protocol.
#[derive(Debug, Clone, PartialEq)]
enum CanonicalDelta {
    TextDelta(String),
    ToolCallStart { index: u32, id: String, name: String },
    ToolCallArgsDelta { index: u32, partial_json: String },
    Stop(CanonicalStopReason),
    Usage { input_tokens: u64, output_tokens: u64 },
}

/// A frame ready to be written to the client's response body, already
/// encoded in the client protocol's wire shape (SSE `data: ...\n\n` for
/// OpenAI/Anthropic, a raw JSON line for Gemini's streamGenerateContent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFrame(pub String);

/// Per-stream state needed to emit a protocol-correct sequence of frames:
/// Anthropic needs a `message_start`/`content_block_start` pair before the
/// first delta and a monotonic block index; OpenAI needs a stable chunk
/// id/model/created triple; Gemini needs a stable candidate index.
pub struct StreamTranslator {
    source: Proto,
    target: Proto,
    model: String,
    id: String,
    created: i64,
    started: bool,
    block_open: bool,
    block_index: u32,
    terminal_emitted: bool,
    input_tokens: u64,
    output_tokens: u64,
}

impl StreamTranslator {
    pub fn new(source: Proto, target: Proto, id: impl Into<String>, model: impl Into<String>, created: i64) -> Self {
        Self {
            source,
            target,
            model: model.into(),
            id: id.into(),
            created,
            started: false,
            block_open: false,
            block_index: 0,
            terminal_emitted: false,
            input_tokens: 0,
            output_tokens: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal_emitted
    }

    /// Feed one upstream SSE `data:` payload; returns zero or more frames
    /// ready for the client. Unparseable payloads are dropped with a log
    /// unless source == target, in which case they are forwarded verbatim
    /// since the two protocols coincide byte-for-byte.
    pub fn push(&mut self, data: &str) -> Vec<ClientFrame> {
        if data == "[DONE]" {
            return self.emit_stop(CanonicalStopReason::Stop, true);
        }

        if self.source == self.target {
            return vec![ClientFrame(format_data_event(data))];
        }

        match parse_upstream(self.source, data) {
            Ok(deltas) => deltas.into_iter().flat_map(|d| self.emit(d)).collect(),
            Err(err) => {
                tracing::warn!(error = %err, proto = ?self.source, "dropping unparseable upstream stream chunk");
                Vec::new()
            }
        }
    }

    /// Called once the upstream body ends. If no terminal event was ever
    /// emitted, synthesizes one so the client stream always terminates
    /// cleanly.
    pub fn finish(&mut self) -> Vec<ClientFrame> {
        if self.terminal_emitted {
            return Vec::new();
        }
        self.emit_stop(CanonicalStopReason::Other, true)
    }

    fn emit(&mut self, delta: CanonicalDelta) -> Vec<ClientFrame> {
        match delta {
            CanonicalDelta::TextDelta(text) => self.emit_text(text),
            CanonicalDelta::ToolCallStart { index, id, name } => self.emit_tool_start(index, id, name),
            CanonicalDelta::ToolCallArgsDelta { index, partial_json } => {
                self.emit_tool_args(index, partial_json)
            }
            CanonicalDelta::Usage { input_tokens, output_tokens } => {
                self.input_tokens = input_tokens;
                self.output_tokens = output_tokens;
                Vec::new()
            }
            CanonicalDelta::Stop(reason) => self.emit_stop(reason, false),
        }
    }

    fn ensure_started(&mut self, frames: &mut Vec<ClientFrame>) {
        if self.started {
            return;
        }
        self.started = true;
        if self.target == Proto::Anthropic {
            frames.push(ClientFrame(format_data_event(
                &serde_json::to_string(&AnthropicStreamEvent::MessageStart {
                    message: serde_json::json!({
                        "id": self.id,
                        "type": "message",
                        "role": "assistant",
                        "model": self.model,
                        "content": [],
                    }),
                })
                .expect("serializable"),
            )));
        }
    }

    fn ensure_block_open(&mut self, frames: &mut Vec<ClientFrame>) {
        self.ensure_started(frames);
        if self.block_open {
            return;
        }
        self.block_open = true;
        if self.target == Proto::Anthropic {
            frames.push(ClientFrame(format_data_event(
                &serde_json::to_string(&AnthropicStreamEvent::ContentBlockStart {
                    index: self.block_index,
                    content_block: gproxy_protocol::anthropic::ContentBlock::Text { text: String::new() },
                })
                .expect("serializable"),
            )));
        }
    }

    fn emit_text(&mut self, text: String) -> Vec<ClientFrame> {
        let mut frames = Vec::new();
        self.ensure_block_open(&mut frames);
        match self.target {
            Proto::OpenAiChat => frames.push(self.openai_chunk(ChunkDelta {
                role: None,
                content: Some(text),
                tool_calls: None,
            }, None)),
            Proto::Anthropic => frames.push(ClientFrame(format_data_event(
                &serde_json::to_string(&AnthropicStreamEvent::ContentBlockDelta {
                    index: self.block_index,
                    delta: ContentBlockDelta::TextDelta { text },
                })
                .expect("serializable"),
            ))),
            Proto::Gemini => frames.push(self.gemini_chunk(text, None)),
        }
        frames
    }

    fn emit_tool_start(&mut self, index: u32, id: String, name: String) -> Vec<ClientFrame> {
        let mut frames = Vec::new();
        self.ensure_started(&mut frames);
        match self.target {
            Proto::OpenAiChat => frames.push(self.openai_chunk(
                ChunkDelta {
                    role: None,
                    content: None,
                    tool_calls: Some(vec![gproxy_protocol::openai::ChunkToolCall {
                        index,
                        id: Some(id),
                        kind: Some("function".to_string()),
                        function: Some(gproxy_protocol::openai::ChunkFunctionCall {
                            name: Some(name),
                            arguments: Some(String::new()),
                        }),
                    }]),
                },
                None,
            )),
            Proto::Anthropic => {
                self.block_index = index;
                self.block_open = true;
                frames.push(ClientFrame(format_data_event(
                    &serde_json::to_string(&AnthropicStreamEvent::ContentBlockStart {
                        index,
                        content_block: gproxy_protocol::anthropic::ContentBlock::ToolUse {
                            id,
                            name,
                            input: serde_json::json!({}),
                        },
                    })
                    .expect("serializable"),
                )));
            }
            Proto::Gemini => {
                frames.push(self.gemini_chunk(String::new(), None));
            }
        }
        frames
    }

    fn emit_tool_args(&mut self, index: u32, partial_json: String) -> Vec<ClientFrame> {
        match self.target {
            Proto::OpenAiChat => vec![self.openai_chunk(
                ChunkDelta {
                    role: None,
                    content: None,
                    tool_calls: Some(vec![gproxy_protocol::openai::ChunkToolCall {
                        index,
                        id: None,
                        kind: None,
                        function: Some(gproxy_protocol::openai::ChunkFunctionCall {
                            name: None,
                            arguments: Some(partial_json),
                        }),
                    }]),
                },
                None,
            )],
            Proto::Anthropic => vec![ClientFrame(format_data_event(
                &serde_json::to_string(&AnthropicStreamEvent::ContentBlockDelta {
                    index,
                    delta: ContentBlockDelta::InputJsonDelta { partial_json },
                })
                .expect("serializable"),
            ))],
            Proto::Gemini => Vec::new(),
        }
    }

    fn emit_stop(&mut self, reason: CanonicalStopReason, is_upstream_close: bool) -> Vec<ClientFrame> {
        if self.terminal_emitted {
            return Vec::new();
        }
        self.terminal_emitted = true;
        let mut frames = Vec::new();
        self.ensure_started(&mut frames);

        match self.target {
            Proto::OpenAiChat => {
                frames.push(self.openai_chunk(ChunkDelta::default(), Some(reason.to_openai())));
                frames.push(ClientFrame(DONE_FRAME.to_string()));
            }
            Proto::Anthropic => {
                if self.block_open {
                    frames.push(ClientFrame(format_data_event(
                        &serde_json::to_string(&AnthropicStreamEvent::ContentBlockStop {
                            index: self.block_index,
                        })
                        .expect("serializable"),
                    )));
                }
                frames.push(ClientFrame(format_data_event(
                    &serde_json::to_string(&AnthropicStreamEvent::MessageDelta {
                        delta: gproxy_protocol::anthropic::stream::MessageDeltaPayload {
                            stop_reason: Some(reason.to_anthropic()),
                            stop_sequence: None,
                        },
                        usage: gproxy_protocol::anthropic::Usage {
                            input_tokens: self.input_tokens,
                            output_tokens: self.output_tokens,
                            cache_creation_input_tokens: None,
                            cache_read_input_tokens: None,
                        },
                    })
                    .expect("serializable"),
                )));
                frames.push(ClientFrame(format_data_event(
                    &serde_json::to_string(&AnthropicStreamEvent::MessageStop).expect("serializable"),
                )));
            }
            Proto::Gemini => {
                frames.push(self.gemini_chunk(String::new(), Some(reason.to_gemini())));
            }
        }
        let _ = is_upstream_close;
        frames
    }

    fn openai_chunk(&self, delta: ChunkDelta, finish_reason: Option<&str>) -> ClientFrame {
        let chunk = ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(|s| s.to_string()),
            }],
            usage: None,
        };
        ClientFrame(format_data_event(&serde_json::to_string(&chunk).expect("serializable")))
    }

    fn gemini_chunk(&self, text: String, finish_reason: Option<gproxy_protocol::gemini::FinishReason>) -> ClientFrame {
        let parts = if text.is_empty() {
            Vec::new()
        } else {
            vec![gproxy_protocol::gemini::Part::Text { text }]
        };
        let response = GenerateContentResponse {
            candidates: vec![gproxy_protocol::gemini::Candidate {
                content: gproxy_protocol::gemini::Content { role: Some(gproxy_protocol::gemini::Role::Model), parts },
                finish_reason,
                index: 0,
            }],
            usage_metadata: None,
        };
        ClientFrame(format_data_event(&serde_json::to_string(&response).expect("serializable")))
    }
}

fn parse_upstream(source: Proto, data: &str) -> Result<Vec<CanonicalDelta>, TranslationError> {
    match source {
        Proto::OpenAiChat => {
            let chunk: ChatCompletionChunk = serde_json::from_str(data)
                .map_err(|e| TranslationError::UnparseableChunk(e.to_string()))?;
            let mut out = Vec::new();
            for choice in chunk.choices {
                if let Some(content) = choice.delta.content {
                    out.push(CanonicalDelta::TextDelta(content));
                }
                if let Some(tool_calls) = choice.delta.tool_calls {
                    for tc in tool_calls {
                        if let Some(function) = &tc.function {
                            if let Some(name) = &function.name {
                                out.push(CanonicalDelta::ToolCallStart {
                                    index: tc.index,
                                    id: tc.id.clone().unwrap_or_default(),
                                    name: name.clone(),
                                });
                            }
                            if let Some(args) = &function.arguments {
                                out.push(CanonicalDelta::ToolCallArgsDelta {
                                    index: tc.index,
                                    partial_json: args.clone(),
                                });
                            }
                        }
                    }
                }
                if let Some(reason) = choice.finish_reason {
                    out.push(CanonicalDelta::Stop(CanonicalStopReason::from_openai(&reason)));
                }
            }
            if let Some(usage) = chunk.usage {
                out.push(CanonicalDelta::Usage {
                    input_tokens: usage.prompt_tokens,
                    output_tokens: usage.completion_tokens,
                });
            }
            Ok(out)
        }
        Proto::Anthropic => {
            let event: AnthropicStreamEvent = serde_json::from_str(data)
                .map_err(|e| TranslationError::UnparseableChunk(e.to_string()))?;
            Ok(match event {
                AnthropicStreamEvent::ContentBlockStart { index, content_block } => {
                    match content_block {
                        gproxy_protocol::anthropic::ContentBlock::ToolUse { id, name, .. } => {
                            vec![CanonicalDelta::ToolCallStart { index, id, name }]
                        }
                        gproxy_protocol::anthropic::ContentBlock::Text { text } if !text.is_empty() => {
                            vec![CanonicalDelta::TextDelta(text)]
                        }
                        _ => Vec::new(),
                    }
                }
                AnthropicStreamEvent::ContentBlockDelta { index, delta } => match delta {
                    ContentBlockDelta::TextDelta { text } => vec![CanonicalDelta::TextDelta(text)],
                    ContentBlockDelta::InputJsonDelta { partial_json } => {
                        vec![CanonicalDelta::ToolCallArgsDelta { index, partial_json }]
                    }
                },
                AnthropicStreamEvent::MessageDelta { delta, usage } => {
                    let mut out = vec![CanonicalDelta::Usage {
                        input_tokens: usage.input_tokens,
                        output_tokens: usage.output_tokens,
                    }];
                    if let Some(reason) = delta.stop_reason {
                        out.push(CanonicalDelta::Stop(CanonicalStopReason::from_anthropic(reason)));
                    }
                    out
                }
                AnthropicStreamEvent::MessageStop => Vec::new(),
                AnthropicStreamEvent::ContentBlockStop { .. }
                | AnthropicStreamEvent::MessageStart { .. }
                | AnthropicStreamEvent::Ping
                | AnthropicStreamEvent::Error { .. } => Vec::new(),
            })
        }
        Proto::Gemini => {
            let response: GenerateContentResponse = serde_json::from_str(data)
                .map_err(|e| TranslationError::UnparseableChunk(e.to_string()))?;
            let mut out = Vec::new();
            if let Some(candidate) = response.candidates.into_iter().next() {
                for part in candidate.content.parts {
                    if let gproxy_protocol::gemini::Part::Text { text } = part {
                        if !text.is_empty() {
                            out.push(CanonicalDelta::TextDelta(text));
                        }
                    }
                }
                if let Some(reason) = candidate.finish_reason {
                    out.push(CanonicalDelta::Stop(CanonicalStopReason::from_gemini(reason)));
                }
            }
            if let Some(usage) = response.usage_metadata {
                out.push(CanonicalDelta::Usage {
                    input_tokens: usage.prompt_token_count,
                    output_tokens: usage.candidates_token_count,
                });
            }
            Ok(out)
        }
    }
}

/// Exposed for callers that want to translate a single already-parsed
/// upstream chunk without going through the stateful `StreamTranslator`
/// (e.g. for the non-streaming executor path that drains a stream into a
/// single final response).
pub fn translate_stream_event(source: Proto, data: &str) -> Result<bool, TranslationError> {
    Ok(!parse_upstream(source, data)?.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anthropic_upstream_to_openai_client_text_then_done() {
        let mut t = StreamTranslator::new(Proto::Anthropic, Proto::OpenAiChat, "chatcmpl-1", "claude-sonnet-4-20250514", 0);
        let f1 = t.push(r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#);
        assert!(f1.is_empty());
        let f2 = t.push(r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"H"}}"#);
        assert_eq!(f2.len(), 1);
        assert!(f2[0].0.contains("\"content\":\"H\""));
        let f3 = t.push(r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"i"}}"#);
        assert!(f3[0].0.contains("\"content\":\"i\""));
        let f4 = t.push(r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"input_tokens":1,"output_tokens":2}}"#);
        assert!(f4.iter().any(|f| f.0.contains("finish_reason")));
        assert!(f4.iter().any(|f| f.0 == DONE_FRAME));
        assert!(t.is_terminal());
    }

    #[test]
    fn finish_synthesizes_terminal_event_when_upstream_closes_early() {
        let mut t = StreamTranslator::new(Proto::OpenAiChat, Proto::Anthropic, "id", "model", 0);
        t.push(r#"{"id":"x","object":"chat.completion.chunk","created":0,"model":"m","choices":[{"index":0,"delta":{"content":"hi"},"finish_reason":null}]}"#);
        assert!(!t.is_terminal());
        let frames = t.finish();
        assert!(frames.iter().any(|f| f.0.contains("message_stop")));
        assert!(t.is_terminal());
    }

    #[test]
    fn same_protocol_forwards_verbatim() {
        let mut t = StreamTranslator::new(Proto::OpenAiChat, Proto::OpenAiChat, "id", "model", 0);
        let raw = r#"{"id":"x","object":"chat.completion.chunk","created":0,"model":"m","choices":[]}"#;
        let frames = t.push(raw);
        assert_eq!(frames[0].0, format_data_event(raw));
    }
}
