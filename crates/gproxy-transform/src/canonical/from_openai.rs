use gproxy_protocol::openai::{
    ChatCompletionRequest, ChatMessage, ContentPart, FunctionSpec, MessageContent, ToolCall,
    ToolSpec,
};

use super::{CanonicalContent, CanonicalMessage, CanonicalRequest, CanonicalRole, CanonicalTool};

pub fn openai_to_canonical(req: &ChatCompletionRequest) -> CanonicalRequest {
    let mut system = None;
    let mut messages = Vec::new();

    for msg in &req.messages {
        if msg.role == "system" {
            let text = message_content_to_text(&msg.content);
            system = Some(match system {
                Some(existing) => format!("{existing}\n{text}"),
                None => text,
            });
            continue;
        }

        let role = if msg.role == "assistant" {
            CanonicalRole::Assistant
        } else {
            CanonicalRole::User
        };

        let mut content = Vec::new();
        if msg.role == "tool" {
            content.push(CanonicalContent::ToolResult {
                tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                content: Some(message_content_to_value(&msg.content)),
                is_error: false,
            });
        } else {
            content.extend(content_parts(&msg.content));
            if let Some(tool_calls) = &msg.tool_calls {
                content.extend(tool_calls_to_canonical(tool_calls));
            }
        }
        messages.push(CanonicalMessage { role, content });
    }

    CanonicalRequest {
        system,
        messages,
        tools: req
            .tools
            .as_ref()
            .map(|tools| tools.iter().map(tool_spec_to_canonical).collect())
            .unwrap_or_default(),
        temperature: req.temperature,
        top_p: req.top_p,
        max_tokens: req.max_tokens,
        stop: req.stop.clone().unwrap_or_default(),
        stream: req.stream.unwrap_or(false),
    }
}

pub fn canonical_to_openai(req: &CanonicalRequest) -> ChatCompletionRequest {
    let mut messages = Vec::new();
    if let Some(system) = &req.system {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: MessageContent::Text(system.clone()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        });
    }

    for msg in &req.messages {
        let role = match msg.role {
            CanonicalRole::User => "user",
            CanonicalRole::Assistant => "assistant",
        };

        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();
        for part in &msg.content {
            match part {
                CanonicalContent::Text(text) => text_parts.push(text.clone()),
                CanonicalContent::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall {
                        id: id.clone(),
                        kind: "function".to_string(),
                        function: gproxy_protocol::openai::FunctionCall {
                            name: name.clone(),
                            arguments: input.to_string(),
                        },
                    });
                }
                CanonicalContent::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } => {
                    messages.push(ChatMessage {
                        role: "tool".to_string(),
                        content: MessageContent::Text(
                            content
                                .as_ref()
                                .map(|v| v.to_string())
                                .unwrap_or_default(),
                        ),
                        tool_calls: None,
                        tool_call_id: Some(tool_use_id.clone()),
                        name: None,
                    });
                }
            }
        }

        if !text_parts.is_empty() || !tool_calls.is_empty() {
            messages.push(ChatMessage {
                role: role.to_string(),
                content: MessageContent::Text(text_parts.join("\n")),
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(tool_calls)
                },
                tool_call_id: None,
                name: None,
            });
        }
    }

    ChatCompletionRequest {
        model: String::new(),
        messages,
        temperature: req.temperature,
        top_p: req.top_p,
        max_tokens: req.max_tokens,
        stop: if req.stop.is_empty() {
            None
        } else {
            Some(req.stop.clone())
        },
        stream: Some(req.stream),
        tools: if req.tools.is_empty() {
            None
        } else {
            Some(req.tools.iter().map(canonical_tool_to_spec).collect())
        },
        tool_choice: None,
        extra: Default::default(),
    }
}

fn message_content_to_text(content: &MessageContent) -> String {
    match content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text.clone()),
                ContentPart::ImageUrl { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn message_content_to_value(content: &MessageContent) -> serde_json::Value {
    serde_json::Value::String(message_content_to_text(content))
}

fn content_parts(content: &MessageContent) -> Vec<CanonicalContent> {
    match content {
        MessageContent::Text(text) if text.is_empty() => Vec::new(),
        MessageContent::Text(text) => vec![CanonicalContent::Text(text.clone())],
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(CanonicalContent::Text(text.clone())),
                ContentPart::ImageUrl { .. } => None,
            })
            .collect(),
    }
}

fn tool_calls_to_canonical(tool_calls: &[ToolCall]) -> Vec<CanonicalContent> {
    tool_calls
        .iter()
        .map(|tc| CanonicalContent::ToolUse {
            id: tc.id.clone(),
            name: tc.function.name.clone(),
            input: serde_json::from_str(&tc.function.arguments)
                .unwrap_or(serde_json::Value::Null),
        })
        .collect()
}

fn tool_spec_to_canonical(spec: &ToolSpec) -> CanonicalTool {
    CanonicalTool {
        name: spec.function.name.clone(),
        description: spec.function.description.clone(),
        parameters: spec.function.parameters.clone(),
    }
}

fn canonical_tool_to_spec(tool: &CanonicalTool) -> ToolSpec {
    ToolSpec {
        kind: "function".to_string(),
        function: FunctionSpec {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}
