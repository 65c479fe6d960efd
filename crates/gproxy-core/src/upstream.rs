use gproxy_common::Provider;
use gproxy_storage::CredentialRecord;
use gproxy_transform::Proto;

/// Static per-provider upstream shape: which wire protocol the provider
/// actually speaks, its base URL, and the path template for a chat call.
/// `{model}` in `chat_path`/`stream_path` is substituted with the
/// entry's `modelId`.
#[derive(Debug, Clone, Copy)]
pub struct UpstreamEndpoint {
    pub proto: Proto,
    pub base_url: &'static str,
    pub chat_path: &'static str,
}

pub fn endpoint_for(provider: Provider) -> UpstreamEndpoint {
    match provider {
        Provider::GeminiCli | Provider::Vertex | Provider::Antigravity => UpstreamEndpoint {
            proto: Proto::Gemini,
            base_url: "https://generativelanguage.googleapis.com",
            chat_path: "/v1beta/models/{model}:generateContent",
        },
        Provider::Claude | Provider::Kiro => UpstreamEndpoint {
            proto: Proto::Anthropic,
            base_url: "https://api.anthropic.com",
            chat_path: "/v1/messages",
        },
        Provider::Codex | Provider::GithubCopilot | Provider::Iflow | Provider::Qwen | Provider::OpenaiCompat => {
            UpstreamEndpoint {
                proto: Proto::OpenAiChat,
                base_url: "https://api.openai.com",
                chat_path: "/v1/chat/completions",
            }
        }
    }
}

/// Builds the full URL for one call, substituting `{model}` and, for the
/// Gemini-shaped providers, the `stream` suffix (`generateContent` vs
/// `streamGenerateContent`).
pub fn build_url(provider: Provider, model_id: &str, is_stream: bool) -> String {
    let endpoint = endpoint_for(provider);
    let mut path = endpoint.chat_path.replace("{model}", model_id);
    if endpoint.proto == Proto::Gemini && is_stream {
        path = path.replace(":generateContent", ":streamGenerateContent");
    }
    format!("{}{}", endpoint.base_url, path)
}

/// Per-request headers for the chosen credential. Bearer auth is the
/// common case; Gemini-shaped providers additionally want the project
/// header when the credential carries one.
pub fn build_headers(record: &CredentialRecord) -> Vec<(String, String)> {
    let mut headers = vec![
        ("authorization".to_string(), format!("Bearer {}", record.access_token)),
        ("content-type".to_string(), "application/json".to_string()),
    ];
    if let Some(project_id) = &record.project_id {
        headers.push(("x-goog-user-project".to_string(), project_id.clone()));
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_shaped_providers_use_stream_suffix() {
        let url = build_url(Provider::GeminiCli, "gemini-1.5-pro", true);
        assert!(url.ends_with(":streamGenerateContent"));
        let url = build_url(Provider::GeminiCli, "gemini-1.5-pro", false);
        assert!(url.ends_with(":generateContent"));
    }

    #[test]
    fn openai_shaped_providers_share_one_path() {
        assert_eq!(
            build_url(Provider::Codex, "gpt-4.1", true),
            "https://api.openai.com/v1/chat/completions"
        );
    }
}
