//! Typed configuration model for the Anthropic-to-OpenAI translation gateway.

#![deny(missing_docs)]

mod filters;
mod loader;
mod overrides;
mod provider;
mod store;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};

pub use filters::{SystemClauseFilter, SystemPromptFiltersSection, ToolsSection};
pub use overrides::{ConditionalEntry, ConfigPatchNode, OverrideRule, RoutingPredicate, WhenCondition};
pub use provider::{AdapterKind, ProviderConfig, TimeoutsConfig, ToolPolicyConfig};
pub use store::ConfigStore;

use std::path::Path;

/// Root configuration object, as loaded from the YAML config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_providers")]
    pub providers: IndexMap<String, ProviderConfig>,
    pub overrides: Vec<OverrideRule>,
    pub tools: ToolsSection,
    pub system_prompt_filters: SystemPromptFiltersSection,
    pub timeouts_ms: TimeoutsConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            providers: IndexMap::new(),
            overrides: Vec::new(),
            tools: ToolsSection::default(),
            system_prompt_filters: SystemPromptFiltersSection::default(),
            timeouts_ms: TimeoutsConfig::default(),
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn deserialize_providers<'de, D>(deserializer: D) -> Result<IndexMap<String, ProviderConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut map: IndexMap<String, ProviderConfig> = IndexMap::deserialize(deserializer)?;

    for (name, provider) in &mut map {
        provider.name = name.clone();
    }

    Ok(map)
}

impl Config {
    /// Loads and validates configuration from a YAML file path.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Validates that the configuration has at least one usable provider.
    pub fn validate(&self) -> anyhow::Result<()> {
        loader::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config: Config = serde_yaml::from_str("").unwrap();

        assert!(config.providers.is_empty());
        assert!(config.overrides.is_empty());
        assert_eq!(config.log_level, "info");
        assert_eq!(config.timeouts_ms.connect_ms, 5_000);
        assert_eq!(config.timeouts_ms.read_ms, 30_000);
        assert_eq!(config.tools.policy.restricted_tool_names.len(), 2);
    }
}
