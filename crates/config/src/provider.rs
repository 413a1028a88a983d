use std::collections::BTreeSet;

use serde::Deserialize;
use url::Url;

/// The translation strategy used to reach a configured provider's downstream API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdapterKind {
    /// Forward the filtered Anthropic request byte-for-byte to an Anthropic-compatible backend.
    AnthropicPassthrough,
    /// Translate to/from the OpenAI Responses API, including reasoning continuity.
    Openai,
    /// Translate to/from the OpenAI Chat Completions API.
    OpenaiCompatible,
}

/// Immutable, hashable description of one downstream provider.
///
/// Hashable so it can serve as (half of) the model-client cache key: two providers
/// with the same `base_url` but different adapters or timeouts must not share a client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Populated from the provider's key in the `providers` map, not from the YAML body.
    #[serde(skip)]
    pub name: String,
    pub base_url: Url,
    pub adapter: AdapterKind,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub tools: Option<ToolPolicyConfig>,
    #[serde(default)]
    pub timeouts_ms: Option<TimeoutsConfig>,
}

/// Per-provider (or global) tool restriction list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ToolPolicyConfig {
    pub restricted_tool_names: BTreeSet<String>,
}

impl Default for ToolPolicyConfig {
    fn default() -> Self {
        Self {
            restricted_tool_names: ["WebSearch", "WebFetch"].into_iter().map(String::from).collect(),
        }
    }
}

/// Connect/read timeouts applied to a provider's HTTP client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TimeoutsConfig {
    pub connect_ms: u64,
    pub read_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            connect_ms: 5_000,
            read_ms: 30_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    use super::*;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn provider_config_is_hashable_by_value() {
        let a = ProviderConfig {
            name: "openai".into(),
            base_url: Url::parse("https://api.openai.com").unwrap(),
            adapter: AdapterKind::Openai,
            api_key_env: Some("OPENAI_API_KEY".into()),
            tools: None,
            timeouts_ms: None,
        };
        let b = a.clone();

        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn default_restricted_tool_names() {
        let policy = ToolPolicyConfig::default();
        assert!(policy.restricted_tool_names.contains("WebSearch"));
        assert!(policy.restricted_tool_names.contains("WebFetch"));
        assert_eq!(policy.restricted_tool_names.len(), 2);
    }
}
