use serde::Serialize;

use super::content::AnthropicContentBlock;
use super::request::Role;

/// Non-streaming `POST /v1/messages` response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub response_type: &'static str,
    pub role: Role,
    pub model: String,
    pub content: Vec<AnthropicContentBlock>,
    pub stop_reason: Option<StopReason>,
    pub stop_sequence: Option<String>,
    pub usage: Usage,
}

impl AnthropicResponse {
    pub fn new(id: String, model: String, content: Vec<AnthropicContentBlock>, stop_reason: Option<StopReason>, usage: Usage) -> Self {
        Self {
            id,
            response_type: "message",
            role: Role::Assistant,
            model,
            content,
            stop_reason,
            stop_sequence: None,
            usage,
        }
    }

    /// Mints a fresh `msg_`-prefixed id. The envelope id is never the downstream provider's own
    /// response id — spec.md §4.5 requires it to look indistinguishable from a native Anthropic
    /// response regardless of which adapter produced it.
    pub fn fresh_id() -> String {
        format!("msg_{}", uuid::Uuid::new_v4().simple())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    ToolUse,
    StopSequence,
}

impl StopReason {
    /// Maps an OpenAI `finish_reason` string to the Anthropic taxonomy.
    pub fn from_openai_finish_reason(reason: &str) -> Self {
        match reason {
            "stop" => StopReason::EndTurn,
            "length" => StopReason::MaxTokens,
            "tool_calls" => StopReason::ToolUse,
            "content_filter" => StopReason::StopSequence,
            _ => StopReason::EndTurn,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_reason_mapping() {
        assert_eq!(StopReason::from_openai_finish_reason("stop"), StopReason::EndTurn);
        assert_eq!(StopReason::from_openai_finish_reason("length"), StopReason::MaxTokens);
        assert_eq!(StopReason::from_openai_finish_reason("tool_calls"), StopReason::ToolUse);
        assert_eq!(
            StopReason::from_openai_finish_reason("content_filter"),
            StopReason::StopSequence
        );
        assert_eq!(StopReason::from_openai_finish_reason("anything_else"), StopReason::EndTurn);
    }
}
