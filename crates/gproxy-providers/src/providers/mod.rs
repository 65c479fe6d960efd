mod copilot;
mod openai_compat;
mod vertex;

pub use copilot::CopilotProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use vertex::VertexProvider;

use crate::generic_device_code::{DeviceCodeEndpoints, GenericDeviceCodeProvider};
use crate::generic_oauth::{GenericOAuthProvider, OAuthEndpoints};
use gproxy_common::Provider;

pub fn gemini_cli(client: reqwest::Client) -> GenericOAuthProvider {
    GenericOAuthProvider::new(
        OAuthEndpoints {
            provider: Provider::GeminiCli,
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth",
            token_url: "https://oauth2.googleapis.com/token",
            client_id: "681255809395-oo8ft2oprdrnp9e3aqf6avz3ni29d42r.apps.googleusercontent.com",
            scope: "https://www.googleapis.com/auth/cloud-platform",
            redirect_uri: "http://localhost:18317/google/callback",
            use_pkce: true,
            extra_auth_params: &[("access_type", "offline"), ("prompt", "consent")],
            userinfo_url: Some("https://www.googleapis.com/oauth2/v2/userinfo"),
            fixed_region: None,
            incognito: false,
            email_from_jwt_claim: None,
        },
        client,
    )
}

pub fn claude(client: reqwest::Client) -> GenericOAuthProvider {
    GenericOAuthProvider::new(
        OAuthEndpoints {
            provider: Provider::Claude,
            authorize_url: "https://claude.ai/oauth/authorize",
            token_url: "https://console.anthropic.com/v1/oauth/token",
            client_id: "9d1c250a-e61b-44d9-88ed-5944d1962f5e",
            scope: "org:create_api_key user:profile user:inference",
            redirect_uri: "http://localhost:18317/anthropic/callback",
            use_pkce: true,
            extra_auth_params: &[],
            userinfo_url: None,
            fixed_region: None,
            incognito: false,
            email_from_jwt_claim: Some("email"),
        },
        client,
    )
}

pub fn codex(client: reqwest::Client) -> GenericOAuthProvider {
    GenericOAuthProvider::new(
        OAuthEndpoints {
            provider: Provider::Codex,
            authorize_url: "https://auth.openai.com/oauth/authorize",
            token_url: "https://auth.openai.com/oauth/token",
            client_id: "app_EMoamEEZ73f0CkXaXp7hrann",
            scope: "openid profile email offline_access",
            redirect_uri: "http://localhost:18317/codex/callback",
            use_pkce: true,
            extra_auth_params: &[("audience", "https://api.openai.com/v1")],
            userinfo_url: None,
            fixed_region: None,
            incognito: false,
            email_from_jwt_claim: Some("email"),
        },
        client,
    )
}

pub fn kiro(client: reqwest::Client) -> GenericOAuthProvider {
    GenericOAuthProvider::new(
        OAuthEndpoints {
            provider: Provider::Kiro,
            authorize_url: "https://prod.us-east-1.auth.desktop.kiro.dev/oauth2/authorize",
            token_url: "https://prod.us-east-1.auth.desktop.kiro.dev/oauth2/token",
            client_id: "kiro-cli",
            scope: "openid profile",
            redirect_uri: "http://localhost:18317/kiro/callback",
            use_pkce: true,
            extra_auth_params: &[],
            userinfo_url: None,
            fixed_region: Some("us-east-1"),
            incognito: true,
            email_from_jwt_claim: None,
        },
        client,
    )
}

pub fn antigravity(client: reqwest::Client) -> GenericOAuthProvider {
    GenericOAuthProvider::new(
        OAuthEndpoints {
            provider: Provider::Antigravity,
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth",
            token_url: "https://oauth2.googleapis.com/token",
            client_id: "antigravity-cli.apps.googleusercontent.com",
            scope: "https://www.googleapis.com/auth/cloud-platform",
            redirect_uri: "http://localhost:18317/google/callback",
            use_pkce: true,
            extra_auth_params: &[],
            userinfo_url: Some("https://www.googleapis.com/oauth2/v2/userinfo"),
            fixed_region: None,
            incognito: false,
            email_from_jwt_claim: None,
        },
        client,
    )
}

pub fn iflow(client: reqwest::Client) -> GenericOAuthProvider {
    GenericOAuthProvider::new(
        OAuthEndpoints {
            provider: Provider::Iflow,
            authorize_url: "https://iflow.cn/oauth/authorize",
            token_url: "https://iflow.cn/oauth/token",
            client_id: "iflow-cli",
            scope: "profile inference",
            redirect_uri: "http://localhost:18317/oauth/callback",
            use_pkce: true,
            extra_auth_params: &[],
            userinfo_url: None,
            fixed_region: None,
            incognito: false,
            email_from_jwt_claim: None,
        },
        client,
    )
}

pub fn qwen(client: reqwest::Client) -> GenericDeviceCodeProvider {
    GenericDeviceCodeProvider::new(
        DeviceCodeEndpoints {
            provider: Provider::Qwen,
            device_auth_url: "https://chat.qwen.ai/api/v1/oauth2/device/code",
            token_url: "https://chat.qwen.ai/api/v1/oauth2/token",
            client_id: "qwen-code-cli",
            scope: "profile inference",
        },
        client,
    )
}
