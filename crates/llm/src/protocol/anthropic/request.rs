use serde::{Deserialize, Serialize};

use crate::protocol::unknown_fields::UnknownFields;

use super::content::AnthropicContentBlock;

/// `POST /v1/messages` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicRequest {
    pub model: String,
    #[serde(default)]
    pub system: Option<SystemPrompt>,
    pub messages: Vec<AnthropicMessage>,
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub top_k: Option<u32>,
    #[serde(default)]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default)]
    pub stream: Option<bool>,
    #[serde(default)]
    pub tools: Option<Vec<AnthropicTool>>,
    #[serde(default)]
    pub tool_choice: Option<serde_json::Value>,
    #[serde(default)]
    pub thinking: Option<ThinkingConfig>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

impl AnthropicRequest {
    pub fn is_streaming(&self) -> bool {
        self.stream.unwrap_or(false)
    }

    /// Concatenation of all `system` text, used by the `system_regex` predicate.
    pub fn system_text(&self) -> String {
        match &self.system {
            None => String::new(),
            Some(SystemPrompt::Text(text)) => text.clone(),
            Some(SystemPrompt::Blocks(blocks)) => {
                blocks.iter().map(|b| b.text.as_str()).collect::<Vec<_>>().join("")
            }
        }
    }

    /// Text content of the *last* message with role `user`, per the
    /// `user_regex` predicate's definition (earlier user turns are ignored).
    pub fn last_user_text(&self) -> String {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.text_content())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicMessage {
    pub role: Role,
    pub content: MessageContent,
}

/// `system` and message `content` may be a bare string or a list of blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<AnthropicContentBlock>),
}

impl MessageContent {
    pub fn into_blocks(self) -> Vec<AnthropicContentBlock> {
        match self {
            MessageContent::Text(text) => vec![AnthropicContentBlock::Text {
                text,
                unknown_fields: UnknownFields::default(),
            }],
            MessageContent::Blocks(blocks) => blocks,
        }
    }

    pub fn blocks(&self) -> Vec<&AnthropicContentBlock> {
        match self {
            MessageContent::Text(_) => Vec::new(),
            MessageContent::Blocks(blocks) => blocks.iter().collect(),
        }
    }

    fn text_content(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|block| match block {
                    AnthropicContentBlock::Text { text, .. } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SystemPrompt {
    Text(String),
    Blocks(Vec<SystemBlock>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: serde_json::Value,
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThinkingConfig {
    Enabled { budget_tokens: u32 },
    Disabled,
}

impl ThinkingConfig {
    pub fn budget_tokens(&self) -> Option<u32> {
        match self {
            ThinkingConfig::Enabled { budget_tokens } => Some(*budget_tokens),
            ThinkingConfig::Disabled => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn last_user_text_ignores_earlier_user_turns() {
        let request: AnthropicRequest = serde_json::from_str(indoc! {r#"
            {
                "model": "claude-3",
                "max_tokens": 16,
                "messages": [
                    {"role": "user", "content": "first"},
                    {"role": "assistant", "content": "reply"},
                    {"role": "user", "content": "second"}
                ]
            }
        "#})
        .unwrap();

        assert_eq!(request.last_user_text(), "second");
    }

    #[test]
    fn system_text_concatenates_blocks() {
        let request: AnthropicRequest = serde_json::from_str(indoc! {r#"
            {
                "model": "claude-3",
                "max_tokens": 16,
                "system": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}],
                "messages": []
            }
        "#})
        .unwrap();

        assert_eq!(request.system_text(), "ab");
    }
}
