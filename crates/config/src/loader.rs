use std::path::Path;

use anyhow::{bail, Context as _};

use crate::Config;

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    let config: Config =
        serde_yaml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))?;

    validate(&config)?;

    Ok(config)
}

pub(crate) fn validate(config: &Config) -> anyhow::Result<()> {
    if config.providers.is_empty() {
        bail!(
            "no downstream providers configured; at least one entry is required under `providers`\n\n\
             Example:\n\n  providers:\n    anthropic:\n      base_url: https://api.anthropic.com\n      adapter: anthropic-passthrough"
        );
    }

    for rule in &config.overrides {
        if let Some(provider) = &rule.provider
            && !config.providers.contains_key(provider)
        {
            bail!("override rule references unknown provider '{provider}'");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use crate::Config;

    fn parse(yaml: &str) -> Config {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn validation_fails_with_no_providers() {
        let config = Config::default();
        let err = super::validate(&config).unwrap_err();
        assert!(err.to_string().contains("no downstream providers configured"));
    }

    #[test]
    fn validation_passes_with_one_provider() {
        let config = parse(indoc! {r#"
            providers:
              anthropic:
                base_url: https://api.anthropic.com
                adapter: anthropic-passthrough
        "#});

        assert!(super::validate(&config).is_ok());
    }

    #[test]
    fn validation_fails_on_override_referencing_unknown_provider() {
        let config = parse(indoc! {r#"
            providers:
              anthropic:
                base_url: https://api.anthropic.com
                adapter: anthropic-passthrough

            overrides:
              - provider: openai
        "#});

        let err = super::validate(&config).unwrap_err();
        assert!(err.to_string().contains("unknown provider 'openai'"));
    }

    #[test]
    fn provider_name_is_filled_from_the_map_key() {
        let config = parse(indoc! {r#"
            providers:
              openai:
                base_url: https://api.openai.com
                adapter: openai
        "#});

        assert_eq!(config.providers["openai"].name, "openai");
    }
}
