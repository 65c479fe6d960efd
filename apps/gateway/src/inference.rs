use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::StreamExt;
use gproxy_core::InferenceResult;
use gproxy_protocol::anthropic::MessagesRequest;
use gproxy_protocol::gemini::GenerateContentRequest;
use gproxy_protocol::models::{ModelInfo, ModelListResponse};
use gproxy_protocol::openai::ChatCompletionRequest;
use gproxy_transform::{self, Request as XRequest};
use time::OffsetDateTime;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::ApiError;
use crate::state::GatewayState;

/// `POST /v1/chat/completions`.
pub async fn openai_chat_completions(
    State(state): State<GatewayState>,
    Json(req): Json<ChatCompletionRequest>,
) -> Result<Response, ApiError> {
    let is_stream = req.stream.unwrap_or(false);
    let virtual_model = req.model.clone();
    run(&state, virtual_model, XRequest::OpenAiChat(req), is_stream).await
}

/// `POST /v1/messages`.
pub async fn anthropic_messages(
    State(state): State<GatewayState>,
    Json(req): Json<MessagesRequest>,
) -> Result<Response, ApiError> {
    let is_stream = req.stream.unwrap_or(false);
    let virtual_model = req.model.clone();
    run(&state, virtual_model, XRequest::Anthropic(req), is_stream).await
}

/// `POST /v1beta/models/{model}:generateContent` and
/// `:streamGenerateContent`. Gemini puts both the model id and
/// the streaming/non-streaming choice in the path, not the body.
pub async fn gemini_generate(
    State(state): State<GatewayState>,
    Path(model_action): Path<String>,
    Json(req): Json<GenerateContentRequest>,
) -> Result<Response, ApiError> {
    let (model, is_stream) = if let Some(model) = model_action.strip_suffix(":streamGenerateContent") {
        (model.to_string(), true)
    } else if let Some(model) = model_action.strip_suffix(":generateContent") {
        (model.to_string(), false)
    } else {
        (model_action, false)
    };
    run(&state, model, XRequest::Gemini(req), is_stream).await
}

async fn run(state: &GatewayState, virtual_model: String, request: XRequest, is_stream: bool) -> Result<Response, ApiError> {
    let cancel = state.app.cancel.child_token();
    let call = gproxy_core::InferenceCall { virtual_model, request, is_stream };
    let result = state.pipeline.run(call, &cancel).await?;
    Ok(render(result))
}

fn render(result: InferenceResult) -> Response {
    match result {
        InferenceResult::Buffered(resp) => match resp {
            gproxy_transform::Response::OpenAiChat(r) => Json(r).into_response(),
            gproxy_transform::Response::Anthropic(r) => Json(r).into_response(),
            gproxy_transform::Response::Gemini(r) => Json(r).into_response(),
        },
        InferenceResult::Stream(rx) => {
            let body = Body::from_stream(
                ReceiverStream::new(rx).map(|frame| Ok::<_, std::convert::Infallible>(bytes::Bytes::from(frame.0))),
            );
            Response::builder()
                .header(header::CONTENT_TYPE, "text/event-stream")
                .header(header::CACHE_CONTROL, "no-cache")
                .body(body)
                .expect("static headers are valid")
        }
    }
}

/// `GET /v1/models`: lists the configured virtual models. A bare
/// provider-model the fallback chain can fall through to isn't
/// enumerable without a request, so only virtual models are listed.
pub async fn list_models(State(state): State<GatewayState>) -> Json<ModelListResponse> {
    let created = OffsetDateTime::now_utc().unix_timestamp();
    let data = state
        .app
        .fallback
        .config()
        .virtual_models
        .iter()
        .filter(|vm| vm.is_enabled)
        .map(|vm| ModelInfo {
            id: vm.name.clone(),
            object: "model".to_string(),
            created,
            owned_by: "gproxy".to_string(),
        })
        .collect();
    Json(ModelListResponse { object: "list".to_string(), data })
}
