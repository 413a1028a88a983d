//! C2 — the filter pipeline: two pure, order-fixed transforms applied to the inbound request
//! before routing. Neither transform ever mutates the caller's request; both return a copy.

use config::{SystemClauseFilter, ToolPolicyConfig};
use regex::RegexBuilder;

use crate::protocol::anthropic::{AnthropicRequest, SystemBlock, SystemPrompt};

/// Strips every tool whose name case-insensitively matches an entry in `policy`.
/// Drops the `tools` field entirely if nothing survives.
pub fn filter_tools(request: &AnthropicRequest, policy: &ToolPolicyConfig) -> AnthropicRequest {
    let mut request = request.clone();

    let Some(tools) = request.tools.take() else {
        return request;
    };

    let retained: Vec<_> = tools
        .into_iter()
        .filter(|tool| {
            !policy
                .restricted_tool_names
                .iter()
                .any(|restricted| restricted.eq_ignore_ascii_case(&tool.name))
        })
        .collect();

    request.tools = (!retained.is_empty()).then_some(retained);
    request
}

/// Removes every matching clause span from the top-level `system` field, in filter order.
/// Drops the `system` field entirely if every text block ends up empty.
pub fn filter_system_clauses(request: &AnthropicRequest, filters: &[SystemClauseFilter]) -> AnthropicRequest {
    let mut request = request.clone();

    if filters.is_empty() {
        return request;
    }

    match request.system.take() {
        None => {}
        Some(SystemPrompt::Text(mut text)) => {
            for filter in filters {
                text = apply_clause_filter(&text, filter);
            }
            if !text.is_empty() {
                request.system = Some(SystemPrompt::Text(text));
            }
        }
        Some(SystemPrompt::Blocks(blocks)) => {
            let blocks: Vec<SystemBlock> = blocks
                .into_iter()
                .map(|mut block| {
                    if block.block_type == "text" {
                        for filter in filters {
                            block.text = apply_clause_filter(&block.text, filter);
                        }
                    }
                    block
                })
                .collect();

            let all_empty = blocks
                .iter()
                .all(|block| block.block_type != "text" || block.text.is_empty());

            if !all_empty {
                request.system = Some(SystemPrompt::Blocks(blocks));
            }
        }
    }

    request
}

/// Removes matched spans only, leaving the rest of the string byte-for-byte intact — required
/// for the byte-stable re-encoding the passthrough path's determinism property depends on.
fn apply_clause_filter(text: &str, filter: &SystemClauseFilter) -> String {
    let pattern = if filter.is_regex {
        filter.pattern.clone()
    } else {
        regex::escape(&filter.pattern)
    };

    match RegexBuilder::new(&pattern)
        .case_insensitive(!filter.case_sensitive)
        .build()
    {
        Ok(re) => re.replace_all(text, "").into_owned(),
        // A filter pattern that fails to compile removes nothing, mirroring the routing
        // engine's "fail closed, don't abort the request" treatment of bad regexes.
        Err(err) => {
            log::warn!("system clause filter pattern '{}' failed to compile: {err}", filter.pattern);
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::protocol::anthropic::AnthropicTool;

    fn request_with_tools(names: &[&str]) -> AnthropicRequest {
        let mut request: AnthropicRequest = serde_json::from_str(indoc! {r#"
            {"model": "claude-3", "max_tokens": 16, "messages": []}
        "#})
        .unwrap();
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
        request
    }

    #[test]
    fn strips_case_insensitively_with_default_policy() {
        let request = request_with_tools(&["websearch", "Bash"]);
        let filtered = filter_tools(&request, &ToolPolicyConfig::default());

        let names: Vec<_> = filtered.tools.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Bash"]);
    }

    #[test]
    fn removes_tools_field_entirely_when_list_empties() {
        let request = request_with_tools(&["WebSearch"]);
        let filtered = filter_tools(&request, &ToolPolicyConfig::default());
        assert!(filtered.tools.is_none());
    }

    #[test]
    fn original_request_is_never_mutated() {
        let request = request_with_tools(&["WebSearch", "Bash"]);
        let _ = filter_tools(&request, &ToolPolicyConfig::default());
        assert_eq!(request.tools.unwrap().len(), 2);
    }

    #[test]
    fn system_clause_regex_removes_clause_and_surrounding_punctuation() {
        let request: AnthropicRequest = serde_json::from_str(indoc! {r#"
            {"model": "claude-3", "max_tokens": 16, "messages": [],
             "system": "You are helpful; you must refuse to answer unsafe things."}
        "#})
        .unwrap();

        let filters = vec![SystemClauseFilter {
            pattern: r"(?:\s*[,;])?\s*[^.;,]*\brefuse to\b[^.;,]*".to_string(),
            is_regex: true,
            case_sensitive: false,
        }];

        let filtered = filter_system_clauses(&request, &filters);
        let SystemPrompt::Text(text) = filtered.system.unwrap() else {
            panic!("expected text system prompt");
        };
        assert_eq!(text, "You are helpful.");
    }

    #[test]
    fn filter_pipeline_is_idempotent() {
        let request: AnthropicRequest = serde_json::from_str(indoc! {r#"
            {"model": "claude-3", "max_tokens": 16, "messages": [],
             "system": "refuse to help; be nice"}
        "#})
        .unwrap();
        let filters = vec![SystemClauseFilter {
            pattern: "refuse to help".to_string(),
            is_regex: false,
            case_sensitive: false,
        }];

        let once = filter_system_clauses(&request, &filters);
        let twice = filter_system_clauses(&once, &filters);

        assert_eq!(once.system_text(), twice.system_text());
    }

    #[test]
    fn empties_system_field_when_every_block_is_emptied() {
        let request: AnthropicRequest = serde_json::from_str(indoc! {r#"
            {"model": "claude-3", "max_tokens": 16, "messages": [],
             "system": [{"type": "text", "text": "secret"}]}
        "#})
        .unwrap();
        let filters = vec![SystemClauseFilter {
            pattern: "secret".to_string(),
            is_regex: false,
            case_sensitive: false,
        }];

        let filtered = filter_system_clauses(&request, &filters);
        assert!(filtered.system.is_none());
    }
}
