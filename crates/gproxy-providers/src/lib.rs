//! Concrete per-provider handlers. Ten providers, each wired to
//! one of the three capability traits from `gproxy-provider-core`: the
//! six whose token exchange is a standard authorization-code(+PKCE) POST
//! share `generic_oauth::GenericOAuthProvider`; the device-code
//! providers share `generic_device_code::GenericDeviceCodeProvider`
//! except Copilot, whose two-step GitHub-token-then-Copilot-token
//! exchange is distinct enough to warrant its own type.

mod generic_device_code;
mod generic_oauth;
pub mod jwt;
pub mod pkce;
pub mod providers;

use std::sync::Arc;

use gproxy_provider_core::ProviderRegistry;

/// Builds an HTTP client shared by every provider handler and registers
/// all ten providers into `registry`.
pub fn register_all(registry: &mut ProviderRegistry, client: reqwest::Client) {
    registry.register_oauth(Arc::new(providers::gemini_cli(client.clone())));
    registry.register_oauth(Arc::new(providers::claude(client.clone())));
    registry.register_oauth(Arc::new(providers::codex(client.clone())));
    registry.register_oauth(Arc::new(providers::kiro(client.clone())));
    registry.register_oauth(Arc::new(providers::antigravity(client.clone())));
    registry.register_oauth(Arc::new(providers::iflow(client.clone())));

    registry.register_device_code(Arc::new(providers::qwen(client.clone())));
    registry.register_device_code(Arc::new(providers::CopilotProvider::new(client.clone())));

    registry.register_service_account(Arc::new(providers::VertexProvider::new(client.clone())));
    registry.register_service_account(Arc::new(providers::OpenAiCompatProvider));
}
