//! Wire types for the OpenAI **Responses** API, the target of the `openai` adapter.
//!
//! Only the subset `spec.md` §4.3/§4.4 actually touches is modeled: input items, the three
//! output item kinds the adapter cares about (message, function call, reasoning), and the
//! streaming event shapes the correlator (`crate::adapter::stream`) needs to drive Anthropic
//! content-block lifecycle events.

use serde::{Deserialize, Serialize};

use crate::protocol::unknown_fields::UnknownFields;

#[derive(Debug, Clone, Serialize)]
pub struct ResponsesRequest {
    pub model: String,
    pub input: Vec<InputItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningConfig>,
    /// Always `["reasoning.encrypted_content"]` when reasoning is in play; per spec.md §4.3
    /// this is a model-client-level setting, not a per-call toggle authors can override.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    pub store: bool,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputItem {
    Message {
        role: InputRole,
        content: Vec<InputContentPart>,
    },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
    Reasoning {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        encrypted_content: Option<String>,
        summary: Vec<ReasoningSummaryPart>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputContentPart {
    InputText { text: String },
    InputImage { image_url: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

impl ToolDef {
    pub fn function(name: String, description: Option<String>, parameters: serde_json::Value) -> Self {
        Self {
            tool_type: "function",
            name: Some(name),
            description,
            parameters: Some(parameters),
        }
    }

    /// The provider's built-in search tool, unconditionally appended on the `openai` adapter
    /// path per spec.md §4.3 (the proxy's own `WebSearch`/`WebFetch` tools may already have
    /// been stripped by C2; this is the downstream's own first-party tool, independent of that).
    pub fn web_search() -> Self {
        Self {
            tool_type: "web_search",
            name: None,
            description: None,
            parameters: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReasoningConfig {
    pub effort: ReasoningEffort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    /// Maps `thinking.budget_tokens` to an effort tier via a threshold table, per spec.md §4.3.
    /// Tuned so that a "none configured" value below the low threshold never happens in
    /// practice (callers only invoke this once `budget_tokens > 0` has been checked).
    pub fn from_budget_tokens(budget_tokens: u32) -> Self {
        const LOW_MAX: u32 = 4_096;
        const MEDIUM_MAX: u32 = 16_384;

        if budget_tokens <= LOW_MAX {
            ReasoningEffort::Low
        } else if budget_tokens <= MEDIUM_MAX {
            ReasoningEffort::Medium
        } else {
            ReasoningEffort::High
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningSummaryPart {
    #[serde(rename = "type")]
    pub part_type: SummaryPartType,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryPartType {
    SummaryText,
}

impl ReasoningSummaryPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            part_type: SummaryPartType::SummaryText,
            text: text.into(),
        }
    }
}

/// Non-streaming response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponsesResponse {
    pub id: String,
    pub model: String,
    #[serde(default)]
    pub output: Vec<OutputItem>,
    #[serde(default)]
    pub usage: ResponsesUsage,
    pub status: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ResponsesUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message {
        id: String,
        #[serde(default)]
        content: Vec<OutputContentPart>,
        #[serde(flatten)]
        extra: UnknownFields,
    },
    FunctionCall {
        id: String,
        call_id: String,
        name: String,
        #[serde(default)]
        arguments: String,
    },
    Reasoning {
        id: String,
        #[serde(default)]
        encrypted_content: Option<String>,
        #[serde(default)]
        summary: Vec<ReasoningSummaryPart>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputContentPart {
    OutputText {
        text: String,
    },
    #[serde(other)]
    Unknown,
}

/// Streaming events, one per SSE `data:` line on a `stream: true` Responses call.
/// Event names carry dots (`response.created`), so each variant is renamed explicitly
/// rather than via a blanket `rename_all`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ResponseStreamEvent {
    #[serde(rename = "response.created")]
    Created,
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded { output_index: u32, item: OutputItem },
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        item_id: String,
        output_index: u32,
        delta: String,
    },
    #[serde(rename = "response.reasoning_summary_text.delta")]
    ReasoningSummaryTextDelta {
        item_id: String,
        output_index: u32,
        delta: String,
    },
    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta {
        item_id: String,
        output_index: u32,
        delta: String,
    },
    #[serde(rename = "response.output_item.done")]
    OutputItemDone { output_index: u32, item: OutputItem },
    #[serde(rename = "response.completed")]
    Completed { response: ResponsesResponse },
    #[serde(rename = "response.incomplete")]
    Incomplete { response: ResponsesResponse },
    #[serde(rename = "response.failed")]
    Failed { response: ResponsesResponse },
    #[serde(rename = "error")]
    Error {
        message: String,
        #[serde(default)]
        code: Option<String>,
    },
    /// Event kinds this gateway doesn't drive any behavior from (e.g. `response.in_progress`,
    /// the `*.done` text/summary echoes of events we already consumed via their `.delta` form).
    #[serde(other)]
    Unhandled,
}
