use serde::Deserialize;

use crate::ToolPolicyConfig;

/// `tools.*` top-level config section.
///
/// `deny_unknown_fields` is deliberately omitted here: serde_derive rejects that attribute
/// on any struct that also has a `#[serde(flatten)]` field. `ToolPolicyConfig` itself still
/// denies unknown fields, so a typo under `tools.*` is still caught — just attributed to the
/// flattened struct rather than this wrapper.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    #[serde(flatten)]
    pub policy: ToolPolicyConfig,
}

/// `system_prompt_filters.*` top-level config section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SystemPromptFiltersSection {
    pub clause_filters: Vec<SystemClauseFilter>,
}

/// One clause to strip from the system prompt, literal or regex.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SystemClauseFilter {
    pub pattern: String,
    pub is_regex: bool,
    pub case_sensitive: bool,
}

impl Default for SystemClauseFilter {
    fn default() -> Self {
        Self {
            pattern: String::new(),
            is_regex: false,
            case_sensitive: false,
        }
    }
}
