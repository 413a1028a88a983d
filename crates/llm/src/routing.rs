//! C3 — the routing engine. `decide` is a pure function of (headers, body, config): same
//! inputs always produce the same [`RouteDecision`] (spec.md §8, "Routing determinism").

use config::{AdapterKind, Config, ConfigPatchNode, OverrideRule, ProviderConfig, RoutingPredicate};
use http::HeaderMap;
use regex::RegexBuilder;

use crate::{error::LlmError, protocol::anthropic::AnthropicRequest};

#[derive(Debug, Clone)]
pub struct RouteDecision {
    pub provider_name: String,
    pub adapter_kind: AdapterKind,
    pub effective_model: String,
    /// The matched rule's config patch, applied by the caller to the body it hands to C4 —
    /// never to a passthrough body, so the byte-stable passthrough invariant holds.
    pub config_patch: indexmap::IndexMap<String, ConfigPatchNode>,
    pub provider_config: ProviderConfig,
}

pub fn decide(headers: &HeaderMap, request: &AnthropicRequest, config: &Config) -> Result<RouteDecision, LlmError> {
    let matched = config.overrides.iter().find(|rule| predicate_matches(&rule.when, headers, request));

    let (rule_provider, rule_model, config_patch) = match matched {
        Some(rule) => (rule.provider.clone(), rule.model.clone(), rule.config.clone()),
        None => (None, None, indexmap::IndexMap::new()),
    };

    let (prefix_provider, suffix_model) = split_provider_prefix(&request.model);

    let provider_name = rule_provider
        .or(prefix_provider.map(str::to_string))
        .unwrap_or_else(|| "anthropic".to_string());

    let provider_config = config
        .providers
        .get(&provider_name)
        .cloned()
        .ok_or_else(|| LlmError::InvalidRequest(format!("unknown provider '{provider_name}'")))?;

    let effective_model = rule_model
        .or(suffix_model.map(str::to_string))
        .unwrap_or_else(|| request.model.clone());

    Ok(RouteDecision {
        provider_name,
        adapter_kind: provider_config.adapter,
        effective_model,
        config_patch,
        provider_config,
    })
}

/// Splits a `provider/model` style model string. Only the first `/` counts as the separator,
/// so model names that themselves contain slashes (e.g. some self-hosted model ids) survive
/// intact in the suffix.
fn split_provider_prefix(model: &str) -> (Option<&str>, Option<&str>) {
    match model.split_once('/') {
        Some((provider, suffix)) => (Some(provider), Some(suffix)),
        None => (None, None),
    }
}

fn predicate_matches(predicate: &RoutingPredicate, headers: &HeaderMap, request: &AnthropicRequest) -> bool {
    if let Some(pattern) = &predicate.system_regex
        && !regex_search(pattern, &request.system_text())
    {
        return false;
    }

    if let Some(pattern) = &predicate.user_regex
        && !regex_search(pattern, &request.last_user_text())
    {
        return false;
    }

    if let Some(pattern) = &predicate.model_regex
        && !regex_search(pattern, &request.model)
    {
        return false;
    }

    if let Some(tool_name) = &predicate.has_tool {
        let has_tool = request
            .tools
            .as_ref()
            .is_some_and(|tools| tools.iter().any(|tool| &tool.name == tool_name));
        if !has_tool {
            return false;
        }
    }

    for (header_name, expected) in &predicate.header {
        let actual = headers.get(header_name).and_then(|value| value.to_str().ok());
        if actual != Some(expected.as_str()) {
            return false;
        }
    }

    true
}

/// Case-insensitive `search` match. A pattern that fails to compile is treated as non-matching
/// rather than aborting the request — kept as spec.md's documented (if debatable) behavior; see
/// DESIGN.md for the open-question resolution.
fn regex_search(pattern: &str, haystack: &str) -> bool {
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(re) => re.is_match(haystack),
        Err(err) => {
            log::warn!("routing predicate regex '{pattern}' failed to compile: {err}");
            false
        }
    }
}

/// Applies a matched rule's `config` patch to `request`, producing the body C4 translates.
/// Patch leaves may target paths outside the typed Anthropic schema (e.g. `reasoning.effort`,
/// an OpenAI-side parameter); applying the patch against the request's JSON projection rather
/// than its typed fields lets any leaf path work uniformly, per spec.md §4.2.
pub fn apply_config_patch(
    request: &AnthropicRequest,
    patch: &indexmap::IndexMap<String, ConfigPatchNode>,
) -> Result<AnthropicRequest, LlmError> {
    if patch.is_empty() {
        return Ok(request.clone());
    }

    let mut value = serde_json::to_value(request)
        .map_err(|err| LlmError::ApiError(format!("failed to project request for config patch: {err}")))?;

    apply_patch_node(&mut value, patch);

    serde_json::from_value(value)
        .map_err(|err| LlmError::ApiError(format!("config patch produced an invalid request: {err}")))
}

fn apply_patch_node(value: &mut serde_json::Value, patch: &indexmap::IndexMap<String, ConfigPatchNode>) {
    if !value.is_object() {
        *value = serde_json::Value::Object(Default::default());
    }
    let object = value.as_object_mut().expect("just ensured object");

    for (key, node) in patch {
        match node {
            ConfigPatchNode::Bare(leaf) => {
                object.insert(key.clone(), leaf.clone());
            }
            ConfigPatchNode::Conditional(entry) => {
                let current = object.get(key).cloned().unwrap_or(serde_json::Value::Null);
                if entry.when.evaluate(&current) {
                    object.insert(key.clone(), entry.value.clone());
                }
            }
            ConfigPatchNode::Branch(nested) => {
                let child = object
                    .entry(key.clone())
                    .or_insert_with(|| serde_json::Value::Object(Default::default()));
                apply_patch_node(child, nested);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    fn config_with_providers(yaml: &str) -> Config {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn request(model: &str) -> AnthropicRequest {
        serde_json::from_str(&format!(r#"{{"model":"{model}","max_tokens":16,"messages":[]}}"#)).unwrap()
    }

    #[test]
    fn provider_prefix_routing() {
        let config = config_with_providers(indoc! {r#"
            providers:
              openai:
                base_url: https://api.openai.com
                adapter: openai
        "#});

        let decision = decide(&HeaderMap::new(), &request("openai/gpt-5"), &config).unwrap();

        assert_eq!(decision.provider_name, "openai");
        assert_eq!(decision.adapter_kind, AdapterKind::Openai);
        assert_eq!(decision.effective_model, "gpt-5");
    }

    #[test]
    fn unknown_provider_is_invalid_request() {
        let config = config_with_providers(indoc! {r#"
            providers:
              anthropic:
                base_url: https://api.anthropic.com
                adapter: anthropic-passthrough
        "#});

        let err = decide(&HeaderMap::new(), &request("ghost/gpt-5"), &config).unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[test]
    fn first_matching_rule_wins() {
        let config = config_with_providers(indoc! {r#"
            providers:
              anthropic:
                base_url: https://api.anthropic.com
                adapter: anthropic-passthrough
              openai:
                base_url: https://api.openai.com
                adapter: openai

            overrides:
              - when:
                  model_regex: "claude"
                provider: anthropic
              - when:
                  model_regex: "."
                provider: openai
        "#});

        let decision = decide(&HeaderMap::new(), &request("claude-3-opus"), &config).unwrap();
        assert_eq!(decision.provider_name, "anthropic");
    }

    #[test]
    fn conditional_patch_applies_only_when_condition_holds() {
        let patch: indexmap::IndexMap<String, ConfigPatchNode> = serde_yaml::from_str(indoc! {r#"
            reasoning:
              effort:
                value: medium
                when:
                  current_in: [null, low, minimum]
        "#})
        .unwrap();

        let no_reasoning = request("gpt-5");
        let patched = apply_config_patch(&no_reasoning, &patch).unwrap();
        assert_eq!(
            patched.unknown_fields.get("reasoning").unwrap()["effort"],
            serde_json::json!("medium")
        );

        let with_high: AnthropicRequest =
            serde_json::from_str(r#"{"model":"gpt-5","max_tokens":16,"messages":[],"reasoning":{"effort":"high"}}"#)
                .unwrap();
        let patched_high = apply_config_patch(&with_high, &patch).unwrap();
        assert_eq!(patched_high.unknown_fields.get("reasoning").unwrap()["effort"], "high");
    }

    #[test]
    fn malformed_regex_does_not_match_and_does_not_abort() {
        let matched = regex_search("(unclosed", "anything");
        assert!(!matched);
    }
}
