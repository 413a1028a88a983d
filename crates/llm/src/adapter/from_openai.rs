//! C5 — translates a non-streaming OpenAI response back into an [`AnthropicResponse`].
//! The streaming counterpart lives in [`crate::adapter::stream`].

use crate::{
    error::LlmError,
    protocol::{
        anthropic::{AnthropicContentBlock, AnthropicResponse, StopReason, Usage},
        openai::{
            chat::ChatCompletionResponse,
            responses::{OutputContentPart, OutputItem, ResponsesResponse},
        },
    },
};

/// Translates a Responses API response, threading reasoning continuity fields (C6) onto the
/// emitted `thinking` block so the next request's C4 pass can reconstruct the reasoning item.
pub fn from_responses(response: ResponsesResponse) -> AnthropicResponse {
    let mut content = Vec::new();
    let mut stop_reason = StopReason::EndTurn;

    for item in response.output {
        match item {
            OutputItem::Message { content: parts, .. } => {
                for part in parts {
                    match part {
                        OutputContentPart::OutputText { text } => {
                            content.push(AnthropicContentBlock::Text {
                                text,
                                unknown_fields: Default::default(),
                            });
                        }
                        OutputContentPart::Unknown => {}
                    }
                }
            }
            OutputItem::FunctionCall { call_id, name, arguments, .. } => {
                stop_reason = StopReason::ToolUse;
                let input = serde_json::from_str(&arguments).unwrap_or(serde_json::Value::Null);
                content.push(AnthropicContentBlock::ToolUse {
                    id: call_id,
                    name,
                    input,
                    unknown_fields: Default::default(),
                });
            }
            OutputItem::Reasoning {
                id,
                encrypted_content,
                summary,
            } => {
                let thinking = summary.into_iter().map(|part| part.text).collect::<Vec<_>>().join("\n");
                content.push(AnthropicContentBlock::Thinking {
                    thinking,
                    signature: None,
                    extracted_openai_rs_id: Some(id),
                    extracted_openai_rs_encrypted_content: encrypted_content,
                    unknown_fields: Default::default(),
                });
            }
        }
    }

    if content.is_empty() {
        content.push(AnthropicContentBlock::empty_text());
    }

    AnthropicResponse::new(
        AnthropicResponse::fresh_id(),
        response.model,
        content,
        Some(stop_reason),
        Usage {
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
        },
    )
}

/// Translates a Chat Completions response. Reasoning carried on a non-standard field (e.g.
/// `reasoning_content`) is surfaced as a `thinking` block with no id/encrypted-content pair —
/// the `openai-compatible` adapter has no reasoning-item concept to round-trip (spec.md §4.4).
pub fn from_chat_completion(response: ChatCompletionResponse) -> Result<AnthropicResponse, LlmError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::ApiError("downstream returned no choices".to_string()))?;

    let mut content = Vec::new();

    if let Some(reasoning) = extract_reasoning_content(&choice.message) {
        content.push(AnthropicContentBlock::Thinking {
            thinking: reasoning,
            signature: None,
            extracted_openai_rs_id: None,
            extracted_openai_rs_encrypted_content: None,
            unknown_fields: Default::default(),
        });
    }

    if let Some(text) = choice.message.content {
        if !text.is_empty() {
            content.push(AnthropicContentBlock::Text {
                text,
                unknown_fields: Default::default(),
            });
        }
    }

    for tool_call in choice.message.tool_calls.into_iter().flatten() {
        let input = serde_json::from_str(&tool_call.function.arguments).unwrap_or(serde_json::Value::Null);
        content.push(AnthropicContentBlock::ToolUse {
            id: tool_call.id,
            name: tool_call.function.name,
            input,
            unknown_fields: Default::default(),
        });
    }

    if content.is_empty() {
        content.push(AnthropicContentBlock::empty_text());
    }

    let stop_reason = StopReason::from_openai_finish_reason(choice.finish_reason.as_deref().unwrap_or("stop"));
    Ok(AnthropicResponse::new(
        AnthropicResponse::fresh_id(),
        response.model,
        content,
        Some(stop_reason),
        Usage {
            input_tokens: response.usage.prompt_tokens,
            output_tokens: response.usage.completion_tokens,
        },
    ))
}

/// Scans the non-standard field bag for the ecosystem's various "reasoning" field names
/// (spec.md §4.4/§9), preferring `reasoning_content` as the most common convention.
fn extract_reasoning_content(message: &crate::protocol::openai::chat::ResponseMessage) -> Option<String> {
    for field in ["reasoning_content", "thinking_content", "reasoning", "thinking"] {
        if let Some(value) = message.extra.get(field) {
            if let Some(text) = value.as_str() {
                if !text.is_empty() {
                    return Some(text.to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn responses_function_call_sets_tool_use_stop_reason() {
        let response: ResponsesResponse = serde_json::from_str(indoc! {r#"
            {
                "id": "resp_1",
                "model": "gpt-5",
                "status": "completed",
                "output": [
                    {"type": "function_call", "id": "item_1", "call_id": "call_1", "name": "lookup", "arguments": "{\"q\":\"x\"}"}
                ],
                "usage": {"input_tokens": 5, "output_tokens": 3}
            }
        "#})
        .unwrap();

        let anthropic = from_responses(response);
        assert_eq!(anthropic.stop_reason, Some(StopReason::ToolUse));
        assert!(matches!(anthropic.content[0], AnthropicContentBlock::ToolUse { .. }));
    }

    #[test]
    fn responses_reasoning_item_carries_id_forward() {
        let response: ResponsesResponse = serde_json::from_str(indoc! {r#"
            {
                "id": "resp_1",
                "model": "gpt-5",
                "status": "completed",
                "output": [
                    {"type": "reasoning", "id": "rs_abc", "summary": [{"type": "summary_text", "text": "because"}]},
                    {"type": "message", "id": "msg_1", "content": [{"type": "output_text", "text": "done"}]}
                ],
                "usage": {"input_tokens": 5, "output_tokens": 3}
            }
        "#})
        .unwrap();

        let anthropic = from_responses(response);
        let AnthropicContentBlock::Thinking {
            extracted_openai_rs_id, ..
        } = &anthropic.content[0]
        else {
            panic!("expected a thinking block first");
        };
        assert_eq!(extracted_openai_rs_id.as_deref(), Some("rs_abc"));
    }

    #[test]
    fn chat_completion_extracts_reasoning_content_field() {
        let response: ChatCompletionResponse = serde_json::from_str(indoc! {r#"
            {
                "id": "chatcmpl_1",
                "model": "local-model",
                "choices": [
                    {"index": 0, "finish_reason": "stop", "message": {"content": "answer", "reasoning_content": "because..."}}
                ],
                "usage": {"prompt_tokens": 4, "completion_tokens": 2}
            }
        "#})
        .unwrap();

        let anthropic = from_chat_completion(response).unwrap();
        assert!(matches!(anthropic.content[0], AnthropicContentBlock::Thinking { .. }));
        assert!(matches!(anthropic.content[1], AnthropicContentBlock::Text { .. }));
    }

    #[test]
    fn chat_completion_maps_tool_calls_finish_reason() {
        let response: ChatCompletionResponse = serde_json::from_str(indoc! {r#"
            {
                "id": "chatcmpl_1",
                "model": "local-model",
                "choices": [
                    {"index": 0, "finish_reason": "tool_calls", "message": {
                        "tool_calls": [{"id": "call_1", "type": "function", "function": {"name": "lookup", "arguments": "{}"}}]
                    }}
                ],
                "usage": {"prompt_tokens": 4, "completion_tokens": 2}
            }
        "#})
        .unwrap();

        let anthropic = from_chat_completion(response).unwrap();
        assert_eq!(anthropic.stop_reason, Some(StopReason::ToolUse));
    }
}
