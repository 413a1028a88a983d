//! C7 — the dispatch layer. Wires the filter pipeline (C2), the routing engine (C3), the
//! client cache (C8), and the C4/C5/C9 adapters together behind the `POST /v1/messages` route,
//! per the request lifecycle in spec.md §4.6.

use std::{collections::VecDeque, convert::Infallible, env, sync::Arc};

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    response::{
        IntoResponse, Response,
        sse::{Event, Sse},
    },
    routing::{get, post},
};
use config::{AdapterKind, ConfigStore, ProviderConfig};
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt, stream};
use http::{HeaderMap, StatusCode, header};
use url::Url;

use crate::{
    adapter::{
        from_openai,
        stream::{ChatStreamDecoder, DecodedChatEvent, DecodedResponsesEvent, NormalizedDelta, ResponsesStreamDecoder, StreamState},
        to_openai,
    },
    client_cache::ClientCache,
    error::LlmError,
    filters,
    headers::insert_proxied_headers_into,
    protocol::{
        anthropic::{AnthropicRequest, AnthropicResponse, StreamEvent},
        openai::{chat::ChatCompletionChunk, responses::ResponseStreamEvent},
    },
    routing,
};

/// Shared state for every request: the hot-reloadable config and the memoized client pool.
#[derive(Clone)]
pub struct AppState {
    config: Arc<ConfigStore>,
    clients: Arc<ClientCache>,
}

impl AppState {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self {
            config,
            clients: Arc::new(ClientCache::new()),
        }
    }
}

/// Builds the gateway's axum router: a liveness check and the single `/v1/messages` surface.
pub fn router(config: Arc<ConfigStore>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/v1/messages", post(handle_messages))
        .with_state(AppState::new(config))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// Matches the Anthropic API's own request body ceiling; oversized bodies fail fast rather than
/// being buffered in full before C2 ever sees them.
const MAX_BODY_BYTES: usize = 32 << 20;

async fn handle_messages(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    match dispatch(&state, &headers, body).await {
        Ok(response) => response,
        Err(error) => error.into_response(),
    }
}

async fn dispatch(state: &AppState, headers: &HeaderMap, body: Bytes) -> Result<Response, LlmError> {
    if body.len() > MAX_BODY_BYTES {
        return Err(LlmError::InvalidRequest(format!("request body exceeds {MAX_BODY_BYTES} bytes")));
    }

    let request: AnthropicRequest =
        serde_json::from_slice(&body).map_err(|err| LlmError::InvalidRequest(format!("invalid request body: {err}")))?;

    let config = state.config.current();
    let (decision, routed_request) = prepare_request(headers, &config, &request)?;

    match decision.adapter_kind {
        // The config patch is produced for C4 only; applying it here would break the
        // byte-stable passthrough invariant the routing engine documents (spec.md §4.6 step 4).
        AdapterKind::AnthropicPassthrough => passthrough(state, &decision.provider_config, headers, &routed_request).await,
        AdapterKind::Openai => {
            let patched = routing::apply_config_patch(&routed_request, &decision.config_patch)?;
            openai_responses(state, &decision.provider_config, &decision.effective_model, &patched).await
        }
        AdapterKind::OpenaiCompatible => {
            let patched = routing::apply_config_patch(&routed_request, &decision.config_patch)?;
            openai_compatible(state, &decision.provider_config, &decision.effective_model, &patched).await
        }
    }
}

/// The pure, network-free half of the request lifecycle (spec.md §4.6 steps 1-3): parses
/// nothing (the caller already has the typed request), runs C2 under the global tool policy,
/// asks C3 for a decision, and re-runs C2 under the provider's own policy if it differs from
/// the global one. Split out from [`dispatch`] so it can be exercised without a live downstream.
fn prepare_request(
    headers: &HeaderMap,
    config: &config::Config,
    request: &AnthropicRequest,
) -> Result<(routing::RouteDecision, AnthropicRequest), LlmError> {
    // C2, fixed order: global tool policy, then system-prompt clause filters (spec.md §4.1).
    let globally_filtered = filters::filter_tools(request, &config.tools.policy);
    let globally_filtered = filters::filter_system_clauses(&globally_filtered, &config.system_prompt_filters.clause_filters);

    // C3 decides against the globally-filtered body, never the raw one (spec.md §4.6 step 2).
    let decision = routing::decide(headers, &globally_filtered, config)?;

    // A provider with its own tool policy re-filters from the original request so its
    // restriction list, not the global one, is what ends up in the forwarded body.
    let provider_policy = decision.provider_config.tools.clone().unwrap_or_else(|| config.tools.policy.clone());
    let filtered_request = if provider_policy == config.tools.policy {
        globally_filtered
    } else {
        let reapplied = filters::filter_tools(request, &provider_policy);
        filters::filter_system_clauses(&reapplied, &config.system_prompt_filters.clause_filters)
    };

    // The resolved model (rule override or provider-prefix suffix) always lands in the body,
    // on every adapter, so a passthrough body is never forwarded with a "provider/model" prefix
    // the downstream Anthropic-compatible API wouldn't understand.
    let mut routed_request = filtered_request;
    routed_request.model = decision.effective_model.clone();

    Ok((decision, routed_request))
}

fn downstream_url(base: &Url, path: &str) -> Url {
    let base = base.as_str().trim_end_matches('/');
    Url::parse(&format!("{base}/{}", path.trim_start_matches('/'))).expect("provider base_url joined with a fixed path is valid")
}

fn map_reqwest_error(err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout(err.to_string())
    } else {
        LlmError::ApiError(err.to_string())
    }
}

/// Resolves the downstream API key from `provider.api_key_env`, if the provider configures one.
/// A provider with no `api_key_env` is assumed to need no auth (e.g. an unauthenticated local
/// inference server); one that configures it but whose env var is unset fails loudly, since a
/// request that silently goes out unauthenticated is worse than one that never goes out at all.
fn resolve_api_key(provider: &ProviderConfig) -> Result<Option<String>, LlmError> {
    match &provider.api_key_env {
        Some(var) => env::var(var)
            .map(Some)
            .map_err(|_| LlmError::Authentication(format!("missing API key env var '{var}' for provider '{}'", provider.name))),
        None => Ok(None),
    }
}

async fn passthrough(state: &AppState, provider: &ProviderConfig, headers: &HeaderMap, request: &AnthropicRequest) -> Result<Response, LlmError> {
    let bytes = serde_json::to_vec(request).map_err(|err| LlmError::ApiError(format!("failed to re-encode request: {err}")))?;

    let client = state.clients.get_or_build(provider, &request.model);
    let url = downstream_url(&provider.base_url, "v1/messages");

    let mut builder = insert_proxied_headers_into(client.post(url), headers).header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = resolve_api_key(provider)? {
        builder = builder.header("x-api-key", key);
    }

    let response = builder.body(bytes).send().await.map_err(map_reqwest_error)?;
    let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| header::HeaderValue::from_static("application/json"));

    let body = if request.is_streaming() {
        Body::from_stream(response.bytes_stream().map(|chunk| chunk.map_err(std::io::Error::other)))
    } else {
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        Body::from(bytes)
    };

    Ok(Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .body(body)
        .expect("status and headers come from a well-formed upstream response"))
}

async fn openai_responses(
    state: &AppState,
    provider: &ProviderConfig,
    model: &str,
    request: &AnthropicRequest,
) -> Result<Response, LlmError> {
    let api_key = resolve_api_key(provider)?;
    let built = to_openai::build_responses_request(request, model.to_string())?;
    let client = state.clients.get_or_build(provider, model);
    let url = downstream_url(&provider.base_url, "responses");

    let mut builder = client.post(url).json(&built);
    if let Some(key) = &api_key {
        builder = builder.bearer_auth(key);
    }

    let response = builder.send().await.map_err(map_reqwest_error)?;
    let status = response.status();

    if built.stream {
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_downstream_status(status, text));
        }
        return Ok(stream_responses(response, model.to_string()).into_response());
    }

    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(LlmError::from_downstream_status(status, text));
    }

    let parsed = response
        .json()
        .await
        .map_err(|err| LlmError::ApiError(format!("invalid response from downstream: {err}")))?;
    Ok(Json(from_openai::from_responses(parsed)).into_response())
}

async fn openai_compatible(
    state: &AppState,
    provider: &ProviderConfig,
    model: &str,
    request: &AnthropicRequest,
) -> Result<Response, LlmError> {
    let api_key = resolve_api_key(provider)?;
    let built = to_openai::build_chat_request(request, model.to_string())?;
    let client = state.clients.get_or_build(provider, model);
    let url = downstream_url(&provider.base_url, "chat/completions");

    let mut builder = client.post(url).json(&built);
    if let Some(key) = &api_key {
        builder = builder.bearer_auth(key);
    }

    let response = builder.send().await.map_err(map_reqwest_error)?;
    let status = response.status();

    if built.stream {
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_downstream_status(status, text));
        }
        return Ok(stream_chat(response, model.to_string()).into_response());
    }

    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(LlmError::from_downstream_status(status, text));
    }

    let parsed = response
        .json()
        .await
        .map_err(|err| LlmError::ApiError(format!("invalid response from downstream: {err}")))?;
    let anthropic = from_openai::from_chat_completion(parsed)?;
    Ok(Json(anthropic).into_response())
}

fn to_sse_event(event: &StreamEvent) -> Event {
    Event::default()
        .event(event.event_name())
        .data(serde_json::to_string(event).expect("StreamEvent always serializes"))
}

type EventSourceStream = std::pin::Pin<Box<dyn Stream<Item = Result<eventsource_stream::Event, eventsource_stream::EventStreamError<reqwest::Error>>> + Send>>;

/// Drives a Responses-API SSE body through [`ResponsesStreamDecoder`] and [`StreamState`],
/// emitting the Anthropic event sequence C9 defines. Built with `stream::unfold` rather than
/// `async-stream` so the correlator stays an explicit, inspectable state machine.
struct ResponsesCursor {
    state: Option<StreamState>,
    decoder: ResponsesStreamDecoder,
    upstream: EventSourceStream,
    pending: VecDeque<StreamEvent>,
    done: bool,
}

fn stream_responses(response: reqwest::Response, model: String) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (state, start_event) = StreamState::start(AnthropicResponse::fresh_id(), model);
    let cursor = ResponsesCursor {
        state: Some(state),
        decoder: ResponsesStreamDecoder::new(),
        upstream: Box::pin(response.bytes_stream().eventsource()),
        pending: VecDeque::from([start_event]),
        done: false,
    };

    let events = stream::unfold(cursor, |mut cursor| async move {
        loop {
            if let Some(event) = cursor.pending.pop_front() {
                return Some((Ok(to_sse_event(&event)), cursor));
            }
            if cursor.done {
                return None;
            }

            match cursor.upstream.next().await {
                None => {
                    cursor.done = true;
                    if let Some(state) = cursor.state.take() {
                        cursor
                            .pending
                            .extend(state.fail(&LlmError::ApiError("downstream stream ended unexpectedly".to_string())));
                    }
                    continue;
                }
                Some(Err(err)) => {
                    cursor.done = true;
                    if let Some(state) = cursor.state.take() {
                        cursor.pending.extend(state.fail(&LlmError::ApiError(format!("downstream stream error: {err}"))));
                    }
                    continue;
                }
                Some(Ok(frame)) => match serde_json::from_str::<ResponseStreamEvent>(&frame.data) {
                    Err(err) => {
                        cursor.done = true;
                        if let Some(state) = cursor.state.take() {
                            cursor
                                .pending
                                .extend(state.fail(&LlmError::ApiError(format!("invalid downstream event: {err}"))));
                        }
                        continue;
                    }
                    Ok(event) => match cursor.decoder.decode(event) {
                        DecodedResponsesEvent::Deltas(deltas) => {
                            if let Some(state) = cursor.state.as_mut() {
                                for delta in deltas {
                                    cursor.pending.extend(state.advance(delta));
                                }
                            }
                            continue;
                        }
                        DecodedResponsesEvent::Completed { stop_reason, .. } => {
                            cursor.done = true;
                            if let Some(state) = cursor.state.take() {
                                cursor.pending.extend(state.finish(stop_reason));
                            }
                            continue;
                        }
                        DecodedResponsesEvent::Failed(error) => {
                            cursor.done = true;
                            if let Some(state) = cursor.state.take() {
                                cursor.pending.extend(state.fail(&error));
                            }
                            continue;
                        }
                    },
                },
            }
        }
    });

    Sse::new(events)
}

/// Mirrors [`ResponsesCursor`] for the `openai-compatible` adapter's Chat Completions stream.
/// A chunk carrying `finish_reason` ends the stream immediately; the trailing literal
/// `data: [DONE]` line some servers send afterward is never reached.
struct ChatCursor {
    state: Option<StreamState>,
    decoder: ChatStreamDecoder,
    upstream: EventSourceStream,
    pending: VecDeque<StreamEvent>,
    done: bool,
}

fn stream_chat(response: reqwest::Response, model: String) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (state, start_event) = StreamState::start(AnthropicResponse::fresh_id(), model);
    let cursor = ChatCursor {
        state: Some(state),
        decoder: ChatStreamDecoder::new(),
        upstream: Box::pin(response.bytes_stream().eventsource()),
        pending: VecDeque::from([start_event]),
        done: false,
    };

    let events = stream::unfold(cursor, |mut cursor| async move {
        loop {
            if let Some(event) = cursor.pending.pop_front() {
                return Some((Ok(to_sse_event(&event)), cursor));
            }
            if cursor.done {
                return None;
            }

            match cursor.upstream.next().await {
                None => {
                    cursor.done = true;
                    if let Some(state) = cursor.state.take() {
                        cursor
                            .pending
                            .extend(state.fail(&LlmError::ApiError("downstream stream ended unexpectedly".to_string())));
                    }
                    continue;
                }
                Some(Err(err)) => {
                    cursor.done = true;
                    if let Some(state) = cursor.state.take() {
                        cursor.pending.extend(state.fail(&LlmError::ApiError(format!("downstream stream error: {err}"))));
                    }
                    continue;
                }
                Some(Ok(frame)) => {
                    if frame.data.trim() == "[DONE]" {
                        continue;
                    }
                    match serde_json::from_str::<ChatCompletionChunk>(&frame.data) {
                        Err(err) => {
                            cursor.done = true;
                            if let Some(state) = cursor.state.take() {
                                cursor
                                    .pending
                                    .extend(state.fail(&LlmError::ApiError(format!("invalid downstream chunk: {err}"))));
                            }
                            continue;
                        }
                        Ok(chunk) => {
                            let DecodedChatEvent { deltas, completion } = cursor.decoder.decode(chunk);
                            if let Some(state) = cursor.state.as_mut() {
                                for delta in deltas {
                                    cursor.pending.extend(state.advance(delta));
                                }
                                if let Some((_, Some(usage))) = completion {
                                    cursor.pending.extend(state.advance(NormalizedDelta::Usage {
                                        input_tokens: usage.input_tokens,
                                        output_tokens: usage.output_tokens,
                                    }));
                                }
                            }
                            if let Some((stop_reason, _)) = completion {
                                cursor.done = true;
                                if let Some(state) = cursor.state.take() {
                                    cursor.pending.extend(state.finish(stop_reason));
                                }
                            }
                            continue;
                        }
                    }
                }
            }
        }
    });

    Sse::new(events)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::protocol::anthropic::AnthropicTool;

    fn config_with(yaml: &str) -> config::Config {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn request_with_tools(model: &str, names: &[&str]) -> AnthropicRequest {
        let mut request: AnthropicRequest =
            serde_json::from_str(&format!(r#"{{"model":"{model}","max_tokens":16,"messages":[]}}"#)).unwrap();
        if !names.is_empty() {
            request.tools = Some(
                names
                    .iter()
                    .map(|name| AnthropicTool {
                        name: (*name).to_string(),
                        description: None,
                        input_schema: serde_json::Value::Null,
                        unknown_fields: Default::default(),
                    })
                    .collect(),
            );
        }
        request
    }

    #[test]
    fn downstream_url_joins_regardless_of_trailing_slash() {
        let with_slash = Url::parse("https://api.openai.com/").unwrap();
        let without_slash = Url::parse("https://api.openai.com").unwrap();

        assert_eq!(downstream_url(&with_slash, "v1/messages").as_str(), "https://api.openai.com/v1/messages");
        assert_eq!(downstream_url(&without_slash, "/v1/messages").as_str(), "https://api.openai.com/v1/messages");
    }

    #[test]
    fn resolve_api_key_is_none_when_provider_declares_no_env() {
        let provider = ProviderConfig {
            name: "local".to_string(),
            base_url: Url::parse("http://localhost:11434").unwrap(),
            adapter: AdapterKind::OpenaiCompatible,
            api_key_env: None,
            tools: None,
            timeouts_ms: None,
        };

        assert_eq!(resolve_api_key(&provider).unwrap(), None);
    }

    #[test]
    fn resolve_api_key_fails_loudly_when_env_var_is_missing() {
        let provider = ProviderConfig {
            name: "openai".to_string(),
            base_url: Url::parse("https://api.openai.com").unwrap(),
            adapter: AdapterKind::Openai,
            api_key_env: Some("LLM_TEST_DISPATCH_MISSING_KEY".to_string()),
            tools: None,
            timeouts_ms: None,
        };

        let err = resolve_api_key(&provider).unwrap_err();
        assert_eq!(err.kind(), "authentication");
    }

    #[test]
    fn resolve_api_key_reads_configured_env_var() {
        // Unique var name per test: env is process-global and tests run concurrently.
        unsafe {
            env::set_var("LLM_TEST_DISPATCH_PRESENT_KEY", "sk-test-123");
        }
        let provider = ProviderConfig {
            name: "openai".to_string(),
            base_url: Url::parse("https://api.openai.com").unwrap(),
            adapter: AdapterKind::Openai,
            api_key_env: Some("LLM_TEST_DISPATCH_PRESENT_KEY".to_string()),
            tools: None,
            timeouts_ms: None,
        };

        assert_eq!(resolve_api_key(&provider).unwrap().as_deref(), Some("sk-test-123"));
        unsafe {
            env::remove_var("LLM_TEST_DISPATCH_PRESENT_KEY");
        }
    }

    #[test]
    fn prepare_request_resolves_effective_model_onto_every_adapter() {
        let config = config_with(indoc! {r#"
            providers:
              openai:
                base_url: https://api.openai.com
                adapter: openai
        "#});

        let (decision, routed) = prepare_request(&HeaderMap::new(), &config, &request_with_tools("openai/gpt-5", &[])).unwrap();

        assert_eq!(decision.effective_model, "gpt-5");
        assert_eq!(routed.model, "gpt-5");
    }

    #[test]
    fn prepare_request_applies_global_tool_policy_before_routing() {
        let config = config_with(indoc! {r#"
            providers:
              openai:
                base_url: https://api.openai.com
                adapter: openai
        "#});

        let (_, routed) = prepare_request(&HeaderMap::new(), &config, &request_with_tools("openai/gpt-5", &["WebSearch", "Bash"])).unwrap();

        let names: Vec<_> = routed.tools.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Bash"]);
    }

    #[test]
    fn prepare_request_reapplies_provider_specific_tool_policy() {
        let config = config_with(indoc! {r#"
            providers:
              openai:
                base_url: https://api.openai.com
                adapter: openai
                tools:
                  restricted_tool_names: ["Bash"]
        "#});

        // The global policy (default: WebSearch, WebFetch) would keep "Bash"; the provider's
        // own, different policy must be the one that actually applies to the forwarded body.
        let (_, routed) = prepare_request(&HeaderMap::new(), &config, &request_with_tools("openai/gpt-5", &["WebSearch", "Bash"])).unwrap();

        let names: Vec<_> = routed.tools.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["WebSearch"]);
    }

    #[test]
    fn prepare_request_skips_refiltering_when_provider_policy_matches_global() {
        let config = config_with(indoc! {r#"
            providers:
              anthropic:
                base_url: https://api.anthropic.com
                adapter: anthropic-passthrough
        "#});

        let (_, routed) = prepare_request(&HeaderMap::new(), &config, &request_with_tools("claude-3-opus", &["WebSearch", "Bash"])).unwrap();

        let names: Vec<_> = routed.tools.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Bash"]);
    }
}
