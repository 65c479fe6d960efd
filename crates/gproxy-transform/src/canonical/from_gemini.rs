use gproxy_protocol::gemini::{
    Content, FunctionCallPart, FunctionDeclaration, FunctionResponsePart, GenerateContentRequest,
    GenerationConfig, Part, Role, Tool,
};

use super::{CanonicalContent, CanonicalMessage, CanonicalRequest, CanonicalRole, CanonicalTool};

pub fn gemini_to_canonical(req: &GenerateContentRequest) -> CanonicalRequest {
    let system = req
        .system_instruction
        .as_ref()
        .map(|c| content_text(c));

    let messages = req
        .contents
        .iter()
        .map(|c| CanonicalMessage {
            role: match c.role {
                Some(Role::Model) => CanonicalRole::Assistant,
                _ => CanonicalRole::User,
            },
            content: c.parts.iter().map(part_to_canonical).collect(),
        })
        .collect();

    let gen = req.generation_config.clone().unwrap_or_default();
    CanonicalRequest {
        system,
        messages,
        tools: req
            .tools
            .as_ref()
            .map(|tools| {
                tools
                    .iter()
                    .flat_map(|t| t.function_declarations.iter())
                    .map(declaration_to_canonical)
                    .collect()
            })
            .unwrap_or_default(),
        temperature: gen.temperature,
        top_p: gen.top_p,
        max_tokens: gen.max_output_tokens,
        stop: gen.stop_sequences.unwrap_or_default(),
        stream: false,
    }
}

pub fn canonical_to_gemini(req: &CanonicalRequest) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: req
            .messages
            .iter()
            .map(|m| Content {
                role: Some(match m.role {
                    CanonicalRole::User => Role::User,
                    CanonicalRole::Assistant => Role::Model,
                }),
                parts: m.content.iter().map(canonical_to_part).collect(),
            })
            .collect(),
        system_instruction: req.system.clone().map(|text| Content {
            role: None,
            parts: vec![Part::Text { text }],
        }),
        generation_config: Some(GenerationConfig {
            temperature: req.temperature,
            top_p: req.top_p,
            max_output_tokens: req.max_tokens,
            stop_sequences: if req.stop.is_empty() { None } else { Some(req.stop.clone()) },
        }),
        tools: if req.tools.is_empty() {
            None
        } else {
            Some(vec![Tool {
                function_declarations: req.tools.iter().map(canonical_to_declaration).collect(),
            }])
        },
        extra: Default::default(),
    }
}

fn content_text(content: &Content) -> String {
    content
        .parts
        .iter()
        .filter_map(|p| match p {
            Part::Text { text } => Some(text.clone()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn part_to_canonical(part: &Part) -> CanonicalContent {
    match part {
        Part::Text { text } => CanonicalContent::Text(text.clone()),
        Part::FunctionCall { function_call } => CanonicalContent::ToolUse {
            id: function_call.name.clone(),
            name: function_call.name.clone(),
            input: function_call.args.clone(),
        },
        Part::FunctionResponse { function_response } => CanonicalContent::ToolResult {
            tool_use_id: function_response.name.clone(),
            content: Some(function_response.response.clone()),
            is_error: false,
        },
    }
}

fn canonical_to_part(content: &CanonicalContent) -> Part {
    match content {
        CanonicalContent::Text(text) => Part::Text { text: text.clone() },
        CanonicalContent::ToolUse { name, input, .. } => Part::FunctionCall {
            function_call: FunctionCallPart {
                name: name.clone(),
                args: input.clone(),
            },
        },
        CanonicalContent::ToolResult {
            tool_use_id,
            content,
            ..
        } => Part::FunctionResponse {
            function_response: FunctionResponsePart {
                name: tool_use_id.clone(),
                response: content.clone().unwrap_or(serde_json::Value::Null),
            },
        },
    }
}

fn declaration_to_canonical(decl: &FunctionDeclaration) -> CanonicalTool {
    CanonicalTool {
        name: decl.name.clone(),
        description: decl.description.clone(),
        parameters: decl.parameters.clone(),
    }
}

fn canonical_to_declaration(tool: &CanonicalTool) -> FunctionDeclaration {
    FunctionDeclaration {
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters: tool.parameters.clone(),
    }
}
