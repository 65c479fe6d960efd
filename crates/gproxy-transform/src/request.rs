use gproxy_protocol::anthropic::MessagesRequest;
use gproxy_protocol::gemini::GenerateContentRequest;
use gproxy_protocol::openai::ChatCompletionRequest;

use crate::canonical::{
    anthropic_to_canonical, canonical_to_anthropic, canonical_to_gemini, canonical_to_openai,
    gemini_to_canonical, openai_to_canonical,
};
use crate::error::TranslationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Proto {
    OpenAiChat,
    Anthropic,
    Gemini,
}

/// A request body tagged with the protocol it is shaped for.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    OpenAiChat(ChatCompletionRequest),
    Anthropic(MessagesRequest),
    Gemini(GenerateContentRequest),
}

impl Request {
    pub fn proto(&self) -> Proto {
        match self {
            Request::OpenAiChat(_) => Proto::OpenAiChat,
            Request::Anthropic(_) => Proto::Anthropic,
            Request::Gemini(_) => Proto::Gemini,
        }
    }
}

/// Convert `req` into `target`'s shape. A same-protocol target is a no-op
/// clone, kept for API symmetry with the six genuine cross-protocol
/// pairs.
pub fn translate_request(req: &Request, target: Proto) -> Result<Request, TranslationError> {
    if req.proto() == target {
        return Ok(req.clone());
    }

    let canonical = match req {
        Request::OpenAiChat(r) => openai_to_canonical(r),
        Request::Anthropic(r) => anthropic_to_canonical(r),
        Request::Gemini(r) => gemini_to_canonical(r),
    };

    Ok(match target {
        Proto::OpenAiChat => Request::OpenAiChat(canonical_to_openai(&canonical)),
        Proto::Anthropic => Request::Anthropic(canonical_to_anthropic(&canonical)),
        Proto::Gemini => Request::Gemini(canonical_to_gemini(&canonical)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gproxy_protocol::openai::{ChatMessage, MessageContent};

    fn sample_openai() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "gpt-4.1".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: MessageContent::Text("hi".to_string()),
                tool_calls: None,
                tool_call_id: None,
                name: None,
            }],
            temperature: Some(0.5),
            top_p: Some(0.9),
            max_tokens: Some(100),
            stop: Some(vec!["STOP".to_string()]),
            stream: Some(false),
            tools: None,
            tool_choice: None,
            extra: Default::default(),
        }
    }

    #[test]
    fn round_trips_standard_fields_through_anthropic() {
        let original = sample_openai();
        let req = Request::OpenAiChat(original.clone());
        let anthropic = translate_request(&req, Proto::Anthropic).unwrap();
        let back = translate_request(&anthropic, Proto::OpenAiChat).unwrap();
        let Request::OpenAiChat(back) = back else {
            panic!("expected openai");
        };
        assert_eq!(back.messages.len(), original.messages.len());
        assert_eq!(back.temperature, original.temperature);
        assert_eq!(back.top_p, original.top_p);
        assert_eq!(back.max_tokens, original.max_tokens);
        assert_eq!(back.stop, original.stop);
    }

    #[test]
    fn round_trips_standard_fields_through_gemini() {
        let original = sample_openai();
        let req = Request::OpenAiChat(original.clone());
        let gemini = translate_request(&req, Proto::Gemini).unwrap();
        let back = translate_request(&gemini, Proto::OpenAiChat).unwrap();
        let Request::OpenAiChat(back) = back else {
            panic!("expected openai");
        };
        assert_eq!(back.max_tokens, original.max_tokens);
        assert_eq!(back.stop, original.stop);
    }

    #[test]
    fn same_protocol_target_is_identity() {
        let req = Request::OpenAiChat(sample_openai());
        let same = translate_request(&req, Proto::OpenAiChat).unwrap();
        assert_eq!(req, same);
    }
}
