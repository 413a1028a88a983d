pub mod chat;
pub mod responses;

/// Fields the OpenAI wire formats are known to emit. Anything else observed in a message's
/// JSON object (after normal deserialization has consumed everything it knows about) is a
/// "custom field" per `spec.md` §4.4 / §9 and gets surfaced through `CUSTOM_FIELD_MAPPING`.
pub const STANDARD_FIELD_ALLOWLIST: &[&str] = &[
    "content",
    "role",
    "name",
    "refusal",
    "tool_calls",
    "tool_call_id",
    "function_call",
    "finish_reason",
    "index",
    "logprobs",
    "delta",
    "usage",
];

/// Maps a non-standard field name to the Anthropic content-block kind it should surface as.
/// Checked against [`STANDARD_FIELD_ALLOWLIST`]'s complement, i.e. only consulted for fields
/// the allowlist doesn't already account for.
pub fn custom_field_block_kind(field_name: &str) -> Option<CustomFieldKind> {
    match field_name {
        "reasoning_content" | "thinking_content" | "reasoning" | "thinking" => Some(CustomFieldKind::Thinking),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomFieldKind {
    Thinking,
}
