use gproxy_protocol::anthropic::{ContentBlock, Message, MessagesRequest, Role, SystemPrompt, Tool};

use super::{CanonicalContent, CanonicalMessage, CanonicalRequest, CanonicalRole, CanonicalTool};

pub fn anthropic_to_canonical(req: &MessagesRequest) -> CanonicalRequest {
    let system = req.system.as_ref().map(|s| match s {
        SystemPrompt::Text(text) => text.clone(),
        SystemPrompt::Blocks(blocks) => blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    });

    let messages = req
        .messages
        .iter()
        .map(|m| CanonicalMessage {
            role: match m.role {
                Role::User => CanonicalRole::User,
                Role::Assistant => CanonicalRole::Assistant,
            },
            content: m.content.iter().map(block_to_canonical).collect(),
        })
        .collect();

    CanonicalRequest {
        system,
        messages,
        tools: req.tools.as_ref().map(|t| t.iter().map(tool_to_canonical).collect()).unwrap_or_default(),
        temperature: req.temperature,
        top_p: req.top_p,
        max_tokens: Some(req.max_tokens),
        stop: req.stop_sequences.clone().unwrap_or_default(),
        stream: req.stream.unwrap_or(false),
    }
}

pub fn canonical_to_anthropic(req: &CanonicalRequest) -> MessagesRequest {
    MessagesRequest {
        model: String::new(),
        messages: req
            .messages
            .iter()
            .map(|m| Message {
                role: match m.role {
                    CanonicalRole::User => Role::User,
                    CanonicalRole::Assistant => Role::Assistant,
                },
                content: m.content.iter().map(canonical_to_block).collect(),
            })
            .collect(),
        system: req.system.clone().map(SystemPrompt::Text),
        max_tokens: req.max_tokens.unwrap_or(4096),
        temperature: req.temperature,
        top_p: req.top_p,
        stop_sequences: if req.stop.is_empty() { None } else { Some(req.stop.clone()) },
        stream: Some(req.stream),
        tools: if req.tools.is_empty() {
            None
        } else {
            Some(req.tools.iter().map(canonical_to_tool).collect())
        },
        tool_choice: None,
        extra: Default::default(),
    }
}

fn block_to_canonical(block: &ContentBlock) -> CanonicalContent {
    match block {
        ContentBlock::Text { text } => CanonicalContent::Text(text.clone()),
        ContentBlock::ToolUse { id, name, input } => CanonicalContent::ToolUse {
            id: id.clone(),
            name: name.clone(),
            input: input.clone(),
        },
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => CanonicalContent::ToolResult {
            tool_use_id: tool_use_id.clone(),
            content: content.clone(),
            is_error: is_error.unwrap_or(false),
        },
    }
}

fn canonical_to_block(content: &CanonicalContent) -> ContentBlock {
    match content {
        CanonicalContent::Text(text) => ContentBlock::Text { text: text.clone() },
        CanonicalContent::ToolUse { id, name, input } => ContentBlock::ToolUse {
            id: id.clone(),
            name: name.clone(),
            input: input.clone(),
        },
        CanonicalContent::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => ContentBlock::ToolResult {
            tool_use_id: tool_use_id.clone(),
            content: content.clone(),
            is_error: Some(*is_error),
        },
    }
}

fn tool_to_canonical(tool: &Tool) -> CanonicalTool {
    CanonicalTool {
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters: Some(tool.input_schema.clone()),
    }
}

fn canonical_to_tool(tool: &CanonicalTool) -> Tool {
    Tool {
        name: tool.name.clone(),
        description: tool.description.clone(),
        input_schema: tool.parameters.clone().unwrap_or(serde_json::json!({"type": "object"})),
    }
}
