use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use gproxy_common::{GatewayConfig, Provider, Strategy};
use gproxy_storage::CredentialStore;
use gproxy_transform::{translate_request, translate_response, Proto, Request, Response, StreamTranslator};
use time::OffsetDateTime;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::executor::{ExecutorRequest, Outcome, ResponseBody, RetryPolicy};
use crate::state::AppState;
use crate::upstream::{build_headers, build_url, endpoint_for};

/// One inference call as the HTTP surface sees it, already parsed into
/// its client-facing protocol's typed request.
pub struct InferenceCall {
    pub virtual_model: String,
    pub request: Request,
    pub is_stream: bool,
}

pub enum InferenceResult {
    Buffered(Response),
    Stream(mpsc::Receiver<gproxy_transform::ClientFrame>),
}

/// Per-credential consecutive quota-exceeded counter driving the
/// escalating cooldown schedule, kept alongside the fallback engine's
/// own per-entry counters since the data model has no field for it.
#[derive(Default)]
pub struct EscalationTracker {
    steps: RwLock<HashMap<String, u32>>,
}

impl EscalationTracker {
    async fn bump(&self, credential_id: &str) -> u32 {
        let mut steps = self.steps.write().await;
        let step = steps.entry(credential_id.to_string()).or_insert(0);
        let current = *step;
        *step += 1;
        current
    }

    async fn reset(&self, credential_id: &str) {
        self.steps.write().await.remove(credential_id);
    }
}

/// Guesses the upstream provider a bare (non-virtual) model id belongs to
/// from its naming convention. The data model has no field linking a
/// model string to a provider outside of fallback-entry configuration, so
/// a request for a model that isn't configured as (or inside) a virtual
/// model falls back on this heuristic; `OpenaiCompat` is the catch-all
/// for anything unrecognized, matching its role as the generic
/// passthrough provider.
pub fn detect_provider_from_model(model: &str) -> Provider {
    if model.starts_with("claude-") {
        Provider::Claude
    } else if model.starts_with("gemini-") {
        Provider::GeminiCli
    } else if model.starts_with("qwen") {
        Provider::Qwen
    } else {
        Provider::OpenaiCompat
    }
}

/// Drives the six-step request flow: resolve the fallback chain, pick a
/// credential per entry via the router/auth manager, translate the
/// request, execute it, translate the response, and record outcome on
/// both the credential and the fallback entry.
pub struct RequestPipeline {
    state: Arc<AppState>,
    escalation: EscalationTracker,
}

impl RequestPipeline {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state, escalation: EscalationTracker::default() }
    }

    pub async fn run(&self, call: InferenceCall, cancel: &CancellationToken) -> Result<InferenceResult, GatewayError> {
        // Cloned out of the ArcSwap rather than held as a `Guard` across
        // the awaits below (the guard isn't meant to outlive a yield).
        let config = self.state.config.load_full();
        let now = OffsetDateTime::now_utc();

        let detected_model = detected_model_id(&call);
        let detected_provider = detect_provider_from_model(detected_model);
        let chain = self
            .state
            .fallback
            .resolve_chain(&call.virtual_model, detected_provider, detected_model, now)
            .await;

        if chain.is_empty() {
            return Err(GatewayError::NoEligibleRoute);
        }

        let mut last_err = None;
        for entry in &chain {
            match self.try_entry(&call, entry, &config, cancel).await {
                Ok(result) => {
                    self.state.fallback.record_success(&call.virtual_model, entry.provider, &entry.model_id, OffsetDateTime::now_utc()).await;
                    self.log_attempt(&call, entry, "ok").await;
                    return Ok(result);
                }
                Err(err) => {
                    self.state.fallback.record_failure(&call.virtual_model, entry.provider, &entry.model_id, OffsetDateTime::now_utc()).await;
                    self.log_attempt(&call, entry, "error").await;
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or(GatewayError::NoEligibleRoute))
    }

    async fn try_entry(
        &self,
        call: &InferenceCall,
        entry: &gproxy_routing::FallbackEntry,
        config: &GatewayConfig,
        cancel: &CancellationToken,
    ) -> Result<InferenceResult, GatewayError> {
        let candidates = self.state.auth_manager.get_auth_files_by_provider(entry.provider).await?;
        let now = OffsetDateTime::now_utc();
        let strategy = parse_strategy(&config.routing_strategy);
        let tau = 0;

        let Some(selected) = self.state.router.select(&candidates, &entry.model_id, strategy, tau, now) else {
            return Err(GatewayError::NoEligibleRoute);
        };
        let record = self.state.auth_manager.refresh_if_needed(selected.clone()).await?;

        let endpoint = endpoint_for(entry.provider);
        let upstream_request = translate_request(&call.request, endpoint.proto)?;
        let url = build_url(entry.provider, &entry.model_id, call.is_stream);
        let headers = build_headers(&record);
        let body = serde_json::to_vec(&to_json(&upstream_request)).map_err(|err| GatewayError::Translation(gproxy_transform::TranslationError::MalformedRequest(err.to_string())))?;

        let timeout = std::time::Duration::from_secs(config.passthrough.timeout.max(1));
        let policy = RetryPolicy::from_config(config, timeout);
        let executor_request = ExecutorRequest {
            method: reqwest::Method::POST,
            url,
            headers,
            body: Some(Bytes::from(body)),
            is_stream: true,
        };

        let outcome = self.state.executor.execute(executor_request, &policy, cancel).await;
        match outcome {
            Outcome::Ok(response) => {
                self.persist(&self.state.router.apply_success(&record, 1)).await;
                self.escalation.reset(&record.id).await;
                self.finish_ok(call, entry, endpoint.proto, response).await
            }
            Outcome::Auth(message) => {
                let updated = self.state.router.apply_auth_error(&record, message.clone());
                self.persist(&updated).await;
                Err(GatewayError::ProviderAuth(message))
            }
            Outcome::Quota(message) => {
                let step = self.escalation.bump(&record.id).await;
                let updated = self.state.router.apply_quota_exceeded(&record, step, message.clone(), OffsetDateTime::now_utc());
                self.persist(&updated).await;
                self.state.fallback.record_quota_exceeded(entry.provider, &entry.model_id, OffsetDateTime::now_utc()).await;
                Err(GatewayError::UpstreamQuota(message))
            }
            Outcome::Retryable(message) => Err(GatewayError::UpstreamRetryable(message)),
            Outcome::Client(status, message) => Err(GatewayError::UpstreamClient(status, message)),
        }
    }

    async fn log_attempt(&self, call: &InferenceCall, entry: &gproxy_routing::FallbackEntry, outcome: &str) {
        self.state
            .request_log
            .push(crate::request_log::RequestLogEntry {
                id: Uuid::new_v4().to_string(),
                at: OffsetDateTime::now_utc(),
                virtual_model: call.virtual_model.clone(),
                provider: entry.provider,
                model_id: entry.model_id.clone(),
                outcome: outcome.to_string(),
            })
            .await;
    }

    async fn persist(&self, record: &gproxy_storage::CredentialRecord) {
        if let Err(err) = self.credential_store().save(record).await {
            tracing::warn!(error = %err, "failed to persist credential state transition");
        }
    }

    fn credential_store(&self) -> Arc<dyn CredentialStore> {
        self.state.auth_manager.credential_store()
    }

    async fn finish_ok(
        &self,
        call: &InferenceCall,
        entry: &gproxy_routing::FallbackEntry,
        upstream_proto: Proto,
        response: crate::executor::UpstreamResponse,
    ) -> Result<InferenceResult, GatewayError> {
        let client_proto = call.request.proto();
        let id = Uuid::new_v4().to_string();
        let created = OffsetDateTime::now_utc().unix_timestamp();

        match response.body {
            ResponseBody::Bytes(bytes) if !call.is_stream => {
                let upstream_response = parse_response(upstream_proto, &bytes)?;
                let translated = translate_response(&upstream_response, client_proto, &entry.model_id, &id, created)?;
                Ok(InferenceResult::Buffered(translated))
            }
            ResponseBody::Bytes(bytes) => {
                // Upstream answered in one shot even though the client
                // wanted a stream; synthesize a single-frame stream.
                let upstream_response = parse_response(upstream_proto, &bytes)?;
                let translated = translate_response(&upstream_response, client_proto, &entry.model_id, &id, created)?;
                let (tx, rx) = mpsc::channel(1);
                let frame = serde_json::to_string(&to_response_json(&translated)).unwrap_or_default();
                tx.send(gproxy_transform::ClientFrame(gproxy_protocol::sse::format_data_event(&frame))).await.ok();
                Ok(InferenceResult::Stream(rx))
            }
            ResponseBody::Stream(mut upstream_rx) => {
                let (tx, rx) = mpsc::channel(32);
                let model = entry.model_id.clone();
                tokio::spawn(async move {
                    let mut sse = gproxy_protocol::sse::SseParser::new();
                    let mut translator = StreamTranslator::new(upstream_proto, client_proto, id, model, created);
                    while let Some(chunk) = upstream_rx.recv().await {
                        let Ok(bytes) = chunk else { break };
                        for event in sse.push_bytes(&bytes) {
                            for frame in translator.push(&event.data) {
                                if tx.send(frame).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                    for event in sse.finish() {
                        for frame in translator.push(&event.data) {
                            tx.send(frame).await.ok();
                        }
                    }
                    if !translator.is_terminal() {
                        for frame in translator.finish() {
                            tx.send(frame).await.ok();
                        }
                    }
                });
                Ok(InferenceResult::Stream(rx))
            }
        }
    }
}

fn parse_strategy(s: &str) -> Strategy {
    match s {
        "fill-first" => Strategy::FillFirst,
        "smart-priority" => Strategy::SmartPriority,
        _ => Strategy::RoundRobin,
    }
}

/// The model id to feed provider detection and fallback-chain
/// resolution with. Gemini's model lives in the URL path rather than
/// the request body, so `call.virtual_model` (already parsed out in
/// the Gemini route handler) stands in for it instead of an empty
/// string, which would otherwise mis-detect the provider.
fn detected_model_id(call: &InferenceCall) -> &str {
    match &call.request {
        Request::OpenAiChat(r) => &r.model,
        Request::Anthropic(r) => &r.model,
        Request::Gemini(_) => &call.virtual_model,
    }
}

fn to_json(request: &Request) -> serde_json::Value {
    match request {
        Request::OpenAiChat(r) => serde_json::to_value(r).unwrap_or_default(),
        Request::Anthropic(r) => serde_json::to_value(r).unwrap_or_default(),
        Request::Gemini(r) => serde_json::to_value(r).unwrap_or_default(),
    }
}

fn to_response_json(response: &Response) -> serde_json::Value {
    match response {
        Response::OpenAiChat(r) => serde_json::to_value(r).unwrap_or_default(),
        Response::Anthropic(r) => serde_json::to_value(r).unwrap_or_default(),
        Response::Gemini(r) => serde_json::to_value(r).unwrap_or_default(),
    }
}

fn parse_response(proto: Proto, bytes: &[u8]) -> Result<Response, GatewayError> {
    let translation_err = |err: serde_json::Error| {
        GatewayError::Translation(gproxy_transform::TranslationError::UnparseableChunk(err.to_string()))
    };
    Ok(match proto {
        Proto::OpenAiChat => Response::OpenAiChat(serde_json::from_slice(bytes).map_err(translation_err)?),
        Proto::Anthropic => Response::Anthropic(serde_json::from_slice(bytes).map_err(translation_err)?),
        Proto::Gemini => Response::Gemini(serde_json::from_slice(bytes).map_err(translation_err)?),
    })
}
