//! The four browser-redirect targets OAuth providers send the user
//! back to after consent. These sit outside `/manage`: the browser has
//! no management key to present, only the `code`/`state` query pair
//! the provider appended to the redirect.

use axum::extract::{Query, State};
use axum::response::Html;
use gproxy_common::Provider;
use serde::Deserialize;

use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

fn success_page(provider: Provider) -> Html<String> {
    Html(format!(
        "<html><body><h1>{provider} connected</h1><p>You can close this tab.</p></body></html>"
    ))
}

fn failure_page(provider: Provider, message: &str) -> Html<String> {
    Html(format!(
        "<html><body><h1>{provider} authorization failed</h1><p>{message}</p></body></html>"
    ))
}

async fn complete(state: GatewayState, provider: Provider, query: CallbackQuery) -> Html<String> {
    match state.app.auth_manager.handle_callback(provider, &query.code, &query.state).await {
        Ok(_) => success_page(provider),
        Err(err) => failure_page(provider, &err.to_string()),
    }
}

pub async fn google(State(state): State<GatewayState>, Query(query): Query<CallbackQuery>) -> Html<String> {
    complete(state, Provider::GeminiCli, query).await
}

pub async fn anthropic(State(state): State<GatewayState>, Query(query): Query<CallbackQuery>) -> Html<String> {
    complete(state, Provider::Claude, query).await
}

pub async fn codex(State(state): State<GatewayState>, Query(query): Query<CallbackQuery>) -> Html<String> {
    complete(state, Provider::Codex, query).await
}

pub async fn kiro(State(state): State<GatewayState>, Query(query): Query<CallbackQuery>) -> Html<String> {
    complete(state, Provider::Kiro, query).await
}
