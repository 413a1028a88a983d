use serde::{Deserialize, Serialize};

use crate::protocol::unknown_fields::UnknownFields;

/// One element of an Anthropic message's ordered `content` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlock {
    Text {
        text: String,
        #[serde(flatten)]
        unknown_fields: UnknownFields,
    },
    /// Carries the reasoning-continuity fields threaded through by C6. Neither
    /// `extracted_openai_rs_id` nor `extracted_openai_rs_encrypted_content` is
    /// part of the Anthropic wire format proper; they ride along as ordinary
    /// JSON fields so a round trip through a non-`openai` adapter still
    /// preserves them verbatim.
    Thinking {
        thinking: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        extracted_openai_rs_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        extracted_openai_rs_encrypted_content: Option<String>,
        #[serde(flatten)]
        unknown_fields: UnknownFields,
    },
    RedactedThinking {
        data: String,
        #[serde(flatten)]
        unknown_fields: UnknownFields,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
        #[serde(flatten)]
        unknown_fields: UnknownFields,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Option<ToolResultContent>,
        #[serde(default)]
        is_error: bool,
        #[serde(flatten)]
        unknown_fields: UnknownFields,
    },
    Image {
        source: ImageSource,
        #[serde(flatten)]
        unknown_fields: UnknownFields,
    },
}

impl AnthropicContentBlock {
    pub fn empty_text() -> Self {
        Self::Text {
            text: String::new(),
            unknown_fields: UnknownFields::default(),
        }
    }

    pub fn empty_thinking() -> Self {
        Self::Thinking {
            thinking: String::new(),
            signature: None,
            extracted_openai_rs_id: None,
            extracted_openai_rs_encrypted_content: None,
            unknown_fields: UnknownFields::default(),
        }
    }

    pub fn tool_use_start(id: String, name: String) -> Self {
        Self::ToolUse {
            id,
            name,
            input: serde_json::Value::Object(Default::default()),
            unknown_fields: UnknownFields::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Blocks(Vec<ToolResultBlock>),
}

impl ToolResultContent {
    /// Flattens to the plain text an `openai-compatible` tool message needs.
    pub fn as_text(&self) -> String {
        match self {
            ToolResultContent::Text(text) => text.clone(),
            ToolResultContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|block| (block.block_type == "text").then(|| block.text.clone()))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    Base64 { media_type: String, data: String },
    Url { url: String },
}
