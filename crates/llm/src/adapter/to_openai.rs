//! C4 — translates a (filtered, routed, patched) [`AnthropicRequest`] into either OpenAI
//! Responses or Chat Completions input, per spec.md §4.3.

use crate::{
    error::LlmError,
    protocol::{
        anthropic::{AnthropicContentBlock, AnthropicRequest, MessageContent, Role, ThinkingConfig},
        openai::{
            chat::{self, ChatCompletionRequest, ChatMessage, ChatRole},
            responses::{InputContentPart, InputItem, InputRole, ReasoningConfig, ReasoningEffort, ResponsesRequest, ToolDef},
        },
    },
    reasoning,
};

/// Builds a Responses API request for the `openai` adapter.
pub fn build_responses_request(request: &AnthropicRequest, model: String) -> Result<ResponsesRequest, LlmError> {
    let mut input = Vec::new();

    let system_text = request.system_text();
    if !system_text.is_empty() {
        input.push(InputItem::Message {
            role: InputRole::System,
            content: vec![InputContentPart::InputText { text: system_text }],
        });
    }

    for message in &request.messages {
        input.extend(responses_items_for_message(message.role, &message.content)?);
    }

    let mut tools: Vec<ToolDef> = request
        .tools
        .as_ref()
        .map(|tools| {
            tools
                .iter()
                .map(|tool| ToolDef::function(tool.name.clone(), tool.description.clone(), tool.input_schema.clone()))
                .collect()
        })
        .unwrap_or_default();
    // Always appended regardless of what C2 stripped from the inbound tool list (spec.md §4.3, §9).
    tools.push(ToolDef::web_search());

    let reasoning = resolve_reasoning_effort(request)?.map(|effort| ReasoningConfig { effort });
    let include = if reasoning.is_some() {
        vec!["reasoning.encrypted_content".to_string()]
    } else {
        Vec::new()
    };

    Ok(ResponsesRequest {
        model,
        input,
        tools,
        reasoning,
        include,
        store: false,
        stream: request.is_streaming(),
        temperature: request.temperature,
        top_p: request.top_p,
        max_output_tokens: Some(request.max_tokens),
    })
}

fn responses_items_for_message(role: Role, content: &MessageContent) -> Result<Vec<InputItem>, LlmError> {
    let input_role = match role {
        Role::User => InputRole::User,
        Role::Assistant => InputRole::Assistant,
    };

    let mut items = Vec::new();
    let mut pending_content = Vec::new();

    let flush = |pending: &mut Vec<InputContentPart>, items: &mut Vec<InputItem>| {
        if !pending.is_empty() {
            items.push(InputItem::Message {
                role: input_role,
                content: std::mem::take(pending),
            });
        }
    };

    let blocks = content.clone().into_blocks();
    for block in &blocks {
        match block {
            AnthropicContentBlock::Text { text, .. } => {
                pending_content.push(InputContentPart::InputText { text: text.clone() });
            }
            AnthropicContentBlock::Image { source, .. } => {
                pending_content.push(InputContentPart::InputImage {
                    image_url: image_source_url(source),
                });
            }
            AnthropicContentBlock::Thinking { thinking, .. } if role == Role::Assistant => {
                match reasoning::reasoning_input_item(block) {
                    Some(item) => {
                        flush(&mut pending_content, &mut items);
                        items.push(item);
                    }
                    None => pending_content.push(InputContentPart::InputText {
                        text: format!("<think>{thinking}</think>"),
                    }),
                }
            }
            AnthropicContentBlock::Thinking { thinking, .. } => {
                pending_content.push(InputContentPart::InputText {
                    text: format!("<think>{thinking}</think>"),
                });
            }
            AnthropicContentBlock::RedactedThinking { .. } => {}
            AnthropicContentBlock::ToolUse { id, name, input, .. } if role == Role::Assistant => {
                if input.is_null() || name.is_empty() {
                    return Err(LlmError::InvalidRequest(format!(
                        "tool_use block '{id}' is missing a name or input"
                    )));
                }
                flush(&mut pending_content, &mut items);
                items.push(InputItem::FunctionCall {
                    call_id: id.clone(),
                    name: name.clone(),
                    arguments: serde_json::to_string(input)
                        .map_err(|err| LlmError::InvalidRequest(format!("failed to serialize tool_use input: {err}")))?,
                });
            }
            AnthropicContentBlock::ToolUse { .. } => {
                return Err(LlmError::InvalidRequest(
                    "tool_use block found outside an assistant turn".to_string(),
                ));
            }
            AnthropicContentBlock::ToolResult {
                tool_use_id, content, ..
            } => {
                flush(&mut pending_content, &mut items);
                items.push(InputItem::FunctionCallOutput {
                    call_id: tool_use_id.clone(),
                    output: content.as_ref().map(|c| c.as_text()).unwrap_or_default(),
                });
            }
        }
    }

    flush(&mut pending_content, &mut items);
    Ok(items)
}

fn image_source_url(source: &crate::protocol::anthropic::ImageSource) -> String {
    use crate::protocol::anthropic::ImageSource;
    match source {
        ImageSource::Base64 { media_type, data } => format!("data:{media_type};base64,{data}"),
        ImageSource::Url { url } => url.clone(),
    }
}

/// `thinking.budget_tokens` maps to `reasoning.effort` via a threshold table unless a config
/// patch already set `reasoning.effort` directly (spec.md §4.3) — patches land in
/// `unknown_fields` since `reasoning` isn't part of the typed Anthropic wire schema.
fn resolve_reasoning_effort(request: &AnthropicRequest) -> Result<Option<ReasoningEffort>, LlmError> {
    if let Some(effort_value) = request
        .unknown_fields
        .get("reasoning")
        .and_then(|reasoning| reasoning.get("effort"))
    {
        let effort: ReasoningEffort = serde_json::from_value(effort_value.clone())
            .map_err(|err| LlmError::InvalidRequest(format!("invalid reasoning.effort override: {err}")))?;
        return Ok(Some(effort));
    }

    match request.thinking.as_ref().and_then(ThinkingConfig::budget_tokens) {
        Some(budget) if budget > 0 => Ok(Some(ReasoningEffort::from_budget_tokens(budget))),
        _ => Ok(None),
    }
}

/// Builds a Chat Completions request for the `openai-compatible` adapter. Reasoning references
/// are not emitted here — only the final assistant turn's reasoning content is carried forward,
/// per the "reasoning workflow" convention (spec.md §4.3); earlier turns' reasoning is dropped.
pub fn build_chat_request(request: &AnthropicRequest, model: String) -> Result<ChatCompletionRequest, LlmError> {
    let mut messages = Vec::new();

    let system_text = request.system_text();
    if !system_text.is_empty() {
        messages.push(ChatMessage {
            role: ChatRole::System,
            content: Some(system_text),
            name: None,
            tool_calls: None,
            tool_call_id: None,
            reasoning_content: None,
        });
    }

    let last_assistant_index = request.messages.iter().rposition(|m| m.role == Role::Assistant);

    for (index, message) in request.messages.iter().enumerate() {
        let is_final_turn = Some(index) == last_assistant_index;
        messages.extend(chat_messages_for(message.role, &message.content, is_final_turn)?);
    }

    Ok(ChatCompletionRequest {
        model,
        messages,
        tools: request
            .tools
            .as_ref()
            .map(|tools| {
                tools
                    .iter()
                    .map(|tool| chat::Tool {
                        tool_type: chat::ToolCallType::Function,
                        function: chat::FunctionDefinition {
                            name: tool.name.clone(),
                            description: tool.description.clone(),
                            parameters: tool.input_schema.clone(),
                        },
                    })
                    .collect()
            })
            .unwrap_or_default(),
        temperature: request.temperature,
        top_p: request.top_p,
        max_tokens: Some(request.max_tokens),
        stop: request.stop_sequences.clone(),
        stream: request.is_streaming(),
    })
}

fn chat_messages_for(role: Role, content: &MessageContent, is_final_turn: bool) -> Result<Vec<ChatMessage>, LlmError> {
    let chat_role = match role {
        Role::User => ChatRole::User,
        Role::Assistant => ChatRole::Assistant,
    };

    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();
    let mut tool_messages = Vec::new();
    let mut reasoning_content = None;

    let blocks = content.clone().into_blocks();
    for block in &blocks {
        match block {
            AnthropicContentBlock::Text { text, .. } => text_parts.push(text.clone()),
            AnthropicContentBlock::Thinking { thinking, .. } if is_final_turn && role == Role::Assistant => {
                reasoning_content = Some(thinking.clone());
            }
            AnthropicContentBlock::Thinking { .. } | AnthropicContentBlock::RedactedThinking { .. } => {}
            AnthropicContentBlock::ToolUse { id, name, input, .. } => {
                if input.is_null() || name.is_empty() {
                    return Err(LlmError::InvalidRequest(format!(
                        "tool_use block '{id}' is missing a name or input"
                    )));
                }
                tool_calls.push(chat::ToolCall {
                    id: id.clone(),
                    call_type: chat::ToolCallType::Function,
                    function: chat::FunctionCall {
                        name: name.clone(),
                        arguments: serde_json::to_string(input)
                            .map_err(|err| LlmError::InvalidRequest(format!("failed to serialize tool_use input: {err}")))?,
                    },
                });
            }
            AnthropicContentBlock::ToolResult {
                tool_use_id, content, ..
            } => {
                tool_messages.push(ChatMessage {
                    role: ChatRole::Tool,
                    content: Some(content.as_ref().map(|c| c.as_text()).unwrap_or_default()),
                    name: None,
                    tool_calls: None,
                    tool_call_id: Some(tool_use_id.clone()),
                    reasoning_content: None,
                });
            }
            AnthropicContentBlock::Image { .. } => {}
        }
    }

    let mut out = Vec::new();
    if !text_parts.is_empty() || !tool_calls.is_empty() || reasoning_content.is_some() {
        out.push(ChatMessage {
            role: chat_role,
            content: (!text_parts.is_empty()).then(|| text_parts.join("")),
            name: None,
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            tool_call_id: None,
            reasoning_content,
        });
    }
    out.extend(tool_messages);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    fn request(json: &str) -> AnthropicRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn web_search_is_always_appended() {
        let req = request(indoc! {r#"
            {"model": "gpt-5", "max_tokens": 16, "messages": [{"role": "user", "content": "hi"}]}
        "#});
        let built = build_responses_request(&req, "gpt-5".to_string()).unwrap();
        assert!(built.tools.iter().any(|t| t.tool_type == "web_search"));
    }

    #[test]
    fn budget_tokens_maps_to_effort_threshold() {
        let req = request(indoc! {r#"
            {"model": "gpt-5", "max_tokens": 16, "messages": [],
             "thinking": {"type": "enabled", "budget_tokens": 20000}}
        "#});
        let built = build_responses_request(&req, "gpt-5".to_string()).unwrap();
        assert_eq!(built.reasoning.unwrap().effort, ReasoningEffort::High);
    }

    #[test]
    fn config_patch_override_wins_over_budget_tokens() {
        let req = request(indoc! {r#"
            {"model": "gpt-5", "max_tokens": 16, "messages": [],
             "thinking": {"type": "enabled", "budget_tokens": 1},
             "reasoning": {"effort": "high"}}
        "#});
        let built = build_responses_request(&req, "gpt-5".to_string()).unwrap();
        assert_eq!(built.reasoning.unwrap().effort, ReasoningEffort::High);
    }

    #[test]
    fn missing_tool_use_input_is_invalid_request() {
        let req = request(indoc! {r#"
            {"model": "gpt-5", "max_tokens": 16, "messages": [
                {"role": "assistant", "content": [{"type": "tool_use", "id": "t1", "name": "lookup"}]}
            ]}
        "#});
        let err = build_responses_request(&req, "gpt-5".to_string()).unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[test]
    fn reasoning_block_with_id_becomes_input_item() {
        let req = request(indoc! {r#"
            {"model": "gpt-5", "max_tokens": 16, "messages": [
                {"role": "assistant", "content": [
                    {"type": "thinking", "thinking": "step", "extracted_openai_rs_id": "rs_abc"}
                ]}
            ]}
        "#});
        let built = build_responses_request(&req, "gpt-5".to_string()).unwrap();
        assert!(built.input.iter().any(|item| matches!(item, InputItem::Reasoning { id: Some(id), .. } if id == "rs_abc")));
    }

    #[test]
    fn chat_adapter_drops_earlier_turn_reasoning_and_keeps_final_turn() {
        let req = request(indoc! {r#"
            {"model": "local-model", "max_tokens": 16, "messages": [
                {"role": "assistant", "content": [{"type": "thinking", "thinking": "first"}, {"type": "text", "text": "a"}]},
                {"role": "user", "content": "more"},
                {"role": "assistant", "content": [{"type": "thinking", "thinking": "final"}, {"type": "text", "text": "b"}]}
            ]}
        "#});
        let built = build_chat_request(&req, "local-model".to_string()).unwrap();
        let reasoning_contents: Vec<_> = built
            .messages
            .iter()
            .filter_map(|m| m.reasoning_content.as_deref())
            .collect();
        assert_eq!(reasoning_contents, vec!["final"]);
    }
}
