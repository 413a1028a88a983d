//! C9 — the streaming event correlator, plus the decoders that normalize each downstream wire
//! format (OpenAI Responses events, OpenAI Chat Completions chunks) into the same small delta
//! vocabulary so [`StreamState`] only has to know one state machine (spec.md §4.4, §9).

use std::collections::HashMap;

use crate::{
    error::LlmError,
    protocol::{
        anthropic::{AnthropicContentBlock, ContentDelta, MessageDeltaPayload, MessageStartEnvelope, StopReason, StreamEvent, Usage},
        openai::{
            chat::ChatCompletionChunk,
            custom_field_block_kind,
            responses::{OutputItem, ResponseStreamEvent},
            CustomFieldKind,
        },
    },
};

/// The common vocabulary both downstream wire formats get normalized into before reaching
/// [`StreamState`]. Nothing downstream-specific (item ids, chunk shapes) survives past here.
#[derive(Debug, Clone)]
pub enum NormalizedDelta {
    Text(String),
    Thinking {
        text: String,
        rs_id: Option<String>,
        encrypted_content: Option<String>,
    },
    ToolCall {
        call_id: String,
        name: Option<String>,
        arguments_delta: String,
    },
    Custom {
        kind: CustomFieldKind,
        text: String,
    },
    Usage {
        input_tokens: u32,
        output_tokens: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum BlockTarget {
    Text,
    Thinking,
    ToolCall(String),
    Custom(CustomFieldKind),
}

struct OpenBlock {
    target: BlockTarget,
    index: u32,
}

/// Per-stream state: which Anthropic content block is currently open, and the running usage
/// snapshot. One instance lives for the duration of a single streamed response (spec.md §3).
pub struct StreamState {
    next_index: u32,
    open: Option<OpenBlock>,
    usage: Usage,
}

impl StreamState {
    /// Starts a stream, returning the state plus the `message_start` event the caller emits
    /// immediately (before any downstream chunk has arrived).
    pub fn start(message_id: String, model: String) -> (Self, StreamEvent) {
        let usage = Usage::default();
        let envelope = MessageStartEnvelope::new(message_id, model, usage);
        (
            Self {
                next_index: 0,
                open: None,
                usage,
            },
            StreamEvent::MessageStart { message: envelope },
        )
    }

    /// Advances the state machine by one normalized delta, returning zero or more Anthropic SSE
    /// events. A block switch emits `content_block_stop` for the old block (if any) followed by
    /// `content_block_start` for the new one, then the delta itself — at most one block is open
    /// at any instant (spec.md §3).
    pub fn advance(&mut self, delta: NormalizedDelta) -> Vec<StreamEvent> {
        match delta {
            NormalizedDelta::Usage {
                input_tokens,
                output_tokens,
            } => {
                self.usage = Usage {
                    input_tokens,
                    output_tokens,
                };
                Vec::new()
            }
            NormalizedDelta::Text(text) => self.emit(
                BlockTarget::Text,
                AnthropicContentBlock::empty_text,
                ContentDelta::TextDelta { text },
            ),
            NormalizedDelta::Thinking {
                text,
                rs_id,
                encrypted_content,
            } => self.emit(
                BlockTarget::Thinking,
                || AnthropicContentBlock::Thinking {
                    thinking: String::new(),
                    signature: None,
                    extracted_openai_rs_id: rs_id.clone(),
                    extracted_openai_rs_encrypted_content: encrypted_content.clone(),
                    unknown_fields: Default::default(),
                },
                ContentDelta::ThinkingDelta { thinking: text },
            ),
            NormalizedDelta::ToolCall {
                call_id,
                name,
                arguments_delta,
            } => {
                let target = BlockTarget::ToolCall(call_id.clone());
                self.emit(
                    target,
                    || AnthropicContentBlock::tool_use_start(call_id.clone(), name.clone().unwrap_or_default()),
                    ContentDelta::InputJsonDelta {
                        partial_json: arguments_delta,
                    },
                )
            }
            // `CustomFieldKind` has one variant today (`Thinking`); a future custom-field kind
            // would need its own block-start constructor here.
            NormalizedDelta::Custom { kind, text } => self.emit(
                BlockTarget::Custom(kind),
                AnthropicContentBlock::empty_thinking,
                ContentDelta::ThinkingDelta { thinking: text },
            ),
        }
    }

    fn emit(
        &mut self,
        target: BlockTarget,
        start_block: impl FnOnce() -> AnthropicContentBlock,
        delta: ContentDelta,
    ) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        let needs_new_block = !matches!(&self.open, Some(open) if open.target == target);
        if needs_new_block {
            if let Some(open) = self.open.take() {
                events.push(StreamEvent::ContentBlockStop { index: open.index });
            }
            let index = self.next_index;
            self.next_index += 1;
            events.push(StreamEvent::ContentBlockStart {
                index,
                content_block: start_block(),
            });
            self.open = Some(OpenBlock { target, index });
        }

        let index = self.open.as_ref().expect("just opened or already open").index;
        events.push(StreamEvent::ContentBlockDelta { index, delta });
        events
    }

    /// Closes the open block (if any), then emits `message_delta`/`message_stop` (spec.md §4.4
    /// step 3). Consumes `self` — a finished stream has nothing left to advance.
    pub fn finish(mut self, stop_reason: StopReason) -> Vec<StreamEvent> {
        let mut events = self.close_open_block();
        events.push(StreamEvent::MessageDelta {
            delta: MessageDeltaPayload {
                stop_reason: Some(stop_reason),
                stop_sequence: None,
            },
            usage: self.usage,
        });
        events.push(StreamEvent::MessageStop);
        events
    }

    /// Mid-stream downstream failure (spec.md §4.4 step 4): close the open block, report
    /// `end_turn` regardless of what was in flight, surface the mapped error, then terminate
    /// cleanly so the client always reaches a consistent state.
    pub fn fail(mut self, error: &LlmError) -> Vec<StreamEvent> {
        let mut events = self.close_open_block();
        events.push(StreamEvent::MessageDelta {
            delta: MessageDeltaPayload {
                stop_reason: Some(StopReason::EndTurn),
                stop_sequence: None,
            },
            usage: self.usage,
        });
        events.push(StreamEvent::Error {
            error: error.to_body().error,
        });
        events.push(StreamEvent::MessageStop);
        events
    }

    fn close_open_block(&mut self) -> Vec<StreamEvent> {
        self.open
            .take()
            .map(|open| vec![StreamEvent::ContentBlockStop { index: open.index }])
            .unwrap_or_default()
    }
}

/// What a decoded Responses-API stream event means for the correlator: either zero or more
/// deltas to advance, or the terminal outcome of the whole stream.
pub enum DecodedResponsesEvent {
    Deltas(Vec<NormalizedDelta>),
    Completed { stop_reason: StopReason, usage: Usage },
    Failed(LlmError),
}

/// Tracks per-item metadata (reasoning id/encrypted-content, function-call id/name) that
/// Responses-API deltas reference by `item_id` but don't repeat on every event.
#[derive(Default)]
pub struct ResponsesStreamDecoder {
    reasoning_meta: HashMap<String, (Option<String>, Option<String>)>,
    function_meta: HashMap<String, (String, Option<String>)>,
}

impl ResponsesStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, event: ResponseStreamEvent) -> DecodedResponsesEvent {
        match event {
            ResponseStreamEvent::Created | ResponseStreamEvent::OutputItemDone { .. } | ResponseStreamEvent::Unhandled => {
                DecodedResponsesEvent::Deltas(Vec::new())
            }
            ResponseStreamEvent::OutputItemAdded { item, .. } => {
                match item {
                    OutputItem::Reasoning { id, encrypted_content, .. } => {
                        self.reasoning_meta.insert(id.clone(), (Some(id), encrypted_content));
                    }
                    OutputItem::FunctionCall { id, call_id, name, .. } => {
                        self.function_meta.insert(id, (call_id, Some(name)));
                    }
                    OutputItem::Message { .. } => {}
                }
                DecodedResponsesEvent::Deltas(Vec::new())
            }
            ResponseStreamEvent::OutputTextDelta { delta, .. } => DecodedResponsesEvent::Deltas(vec![NormalizedDelta::Text(delta)]),
            ResponseStreamEvent::ReasoningSummaryTextDelta { item_id, delta, .. } => {
                let (rs_id, encrypted_content) = self
                    .reasoning_meta
                    .get(&item_id)
                    .cloned()
                    .unwrap_or((Some(item_id.clone()), None));
                DecodedResponsesEvent::Deltas(vec![NormalizedDelta::Thinking {
                    text: delta,
                    rs_id,
                    encrypted_content,
                }])
            }
            ResponseStreamEvent::FunctionCallArgumentsDelta { item_id, delta, .. } => {
                let (call_id, name) = self
                    .function_meta
                    .get(&item_id)
                    .cloned()
                    .unwrap_or_else(|| (item_id.clone(), None));
                DecodedResponsesEvent::Deltas(vec![NormalizedDelta::ToolCall {
                    call_id,
                    name,
                    arguments_delta: delta,
                }])
            }
            ResponseStreamEvent::Completed { response } => {
                let stop_reason = infer_stop_reason(&response.output);
                DecodedResponsesEvent::Completed {
                    stop_reason,
                    usage: Usage {
                        input_tokens: response.usage.input_tokens,
                        output_tokens: response.usage.output_tokens,
                    },
                }
            }
            ResponseStreamEvent::Incomplete { response } => DecodedResponsesEvent::Completed {
                stop_reason: StopReason::MaxTokens,
                usage: Usage {
                    input_tokens: response.usage.input_tokens,
                    output_tokens: response.usage.output_tokens,
                },
            },
            ResponseStreamEvent::Failed { response } => {
                DecodedResponsesEvent::Failed(LlmError::ApiError(format!("downstream response failed (status {})", response.status)))
            }
            ResponseStreamEvent::Error { message, code } => {
                DecodedResponsesEvent::Failed(LlmError::ApiError(format!("{}: {message}", code.unwrap_or_default())))
            }
        }
    }
}

fn infer_stop_reason(output: &[OutputItem]) -> StopReason {
    if output.iter().any(|item| matches!(item, OutputItem::FunctionCall { .. })) {
        StopReason::ToolUse
    } else {
        StopReason::EndTurn
    }
}

/// What decoding one Chat Completions chunk means: any deltas to advance, plus — only on the
/// chunk carrying a `finish_reason` — the stream's terminal outcome.
pub struct DecodedChatEvent {
    pub deltas: Vec<NormalizedDelta>,
    pub completion: Option<(StopReason, Option<Usage>)>,
}

/// Chat Completions deltas identify tool calls by a positional `index`, repeating the call's
/// `id`/function name only on the chunk that first introduces them.
#[derive(Default)]
pub struct ChatStreamDecoder {
    tool_call_meta: HashMap<u32, (String, Option<String>)>,
}

impl ChatStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: ChatCompletionChunk) -> DecodedChatEvent {
        let mut deltas = Vec::new();
        let mut completion = None;

        for choice in &chunk.choices {
            if let Some(content) = &choice.delta.content {
                if !content.is_empty() {
                    deltas.push(NormalizedDelta::Text(content.clone()));
                }
            }

            for tool_call in choice.delta.tool_calls.iter().flatten() {
                let cached = self.tool_call_meta.get(&tool_call.index).cloned();
                let id = tool_call
                    .id
                    .clone()
                    .or_else(|| cached.as_ref().map(|(id, _)| id.clone()))
                    .unwrap_or_default();
                let name = tool_call
                    .function
                    .as_ref()
                    .and_then(|f| f.name.clone())
                    .or_else(|| cached.as_ref().and_then(|(_, name)| name.clone()));
                self.tool_call_meta.insert(tool_call.index, (id.clone(), name.clone()));

                let arguments_delta = tool_call.function.as_ref().and_then(|f| f.arguments.clone()).unwrap_or_default();
                deltas.push(NormalizedDelta::ToolCall {
                    call_id: id,
                    name,
                    arguments_delta,
                });
            }

            for (field, value) in choice.delta.extra.iter() {
                if let Some(kind) = custom_field_block_kind(field) {
                    if let Some(text) = value.as_str() {
                        if !text.is_empty() {
                            deltas.push(NormalizedDelta::Custom {
                                kind,
                                text: text.to_string(),
                            });
                        }
                    }
                }
            }

            if let Some(reason) = &choice.finish_reason {
                completion = Some((StopReason::from_openai_finish_reason(reason), None));
            }
        }

        if let Some(usage) = chunk.usage {
            let usage = Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            };
            completion = completion.map(|(reason, _)| (reason, Some(usage)));
        }

        DecodedChatEvent { deltas, completion }
    }
}
