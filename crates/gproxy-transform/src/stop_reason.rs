use gproxy_protocol::anthropic::StopReason as AnthropicStopReason;
use gproxy_protocol::gemini::FinishReason as GeminiFinishReason;

/// Canonical termination reason:
/// `stop`↔`end_turn`↔`STOP`; `length`↔`max_tokens`↔`MAX_TOKENS`;
/// `tool_use`↔`tool_use`↔`TOOL_USE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalStopReason {
    Stop,
    Length,
    ToolUse,
    Other,
}

impl CanonicalStopReason {
    pub fn to_openai(self) -> &'static str {
        match self {
            CanonicalStopReason::Stop => "stop",
            CanonicalStopReason::Length => "length",
            CanonicalStopReason::ToolUse => "tool_calls",
            CanonicalStopReason::Other => "stop",
        }
    }

    pub fn from_openai(s: &str) -> CanonicalStopReason {
        match s {
            "length" => CanonicalStopReason::Length,
            "tool_calls" => CanonicalStopReason::ToolUse,
            _ => CanonicalStopReason::Stop,
        }
    }

    pub fn to_anthropic(self) -> AnthropicStopReason {
        match self {
            CanonicalStopReason::Stop => AnthropicStopReason::EndTurn,
            CanonicalStopReason::Length => AnthropicStopReason::MaxTokens,
            CanonicalStopReason::ToolUse => AnthropicStopReason::ToolUse,
            CanonicalStopReason::Other => AnthropicStopReason::EndTurn,
        }
    }

    pub fn from_anthropic(reason: AnthropicStopReason) -> CanonicalStopReason {
        match reason {
            AnthropicStopReason::EndTurn => CanonicalStopReason::Stop,
            AnthropicStopReason::MaxTokens => CanonicalStopReason::Length,
            AnthropicStopReason::ToolUse => CanonicalStopReason::ToolUse,
            AnthropicStopReason::StopSequence => CanonicalStopReason::Stop,
        }
    }

    pub fn to_gemini(self) -> GeminiFinishReason {
        match self {
            CanonicalStopReason::Stop => GeminiFinishReason::Stop,
            CanonicalStopReason::Length => GeminiFinishReason::MaxTokens,
            CanonicalStopReason::ToolUse => GeminiFinishReason::ToolUse,
            CanonicalStopReason::Other => GeminiFinishReason::Other,
        }
    }

    pub fn from_gemini(reason: GeminiFinishReason) -> CanonicalStopReason {
        match reason {
            GeminiFinishReason::Stop => CanonicalStopReason::Stop,
            GeminiFinishReason::MaxTokens => CanonicalStopReason::Length,
            GeminiFinishReason::ToolUse => CanonicalStopReason::ToolUse,
            GeminiFinishReason::Safety | GeminiFinishReason::Other => CanonicalStopReason::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_every_protocol() {
        for reason in [
            CanonicalStopReason::Stop,
            CanonicalStopReason::Length,
            CanonicalStopReason::ToolUse,
        ] {
            assert_eq!(CanonicalStopReason::from_openai(reason.to_openai()), reason);
            assert_eq!(
                CanonicalStopReason::from_anthropic(reason.to_anthropic()),
                reason
            );
            assert_eq!(CanonicalStopReason::from_gemini(reason.to_gemini()), reason);
        }
    }
}
