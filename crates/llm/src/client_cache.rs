//! C8 — memoizes the `reqwest::Client` built for each distinct `(ProviderConfig, model)` pair.
//!
//! Keyed on the whole `ProviderConfig`, not just its `base_url`: two providers can share a
//! `base_url` while differing in adapter, api-key env, or timeouts, and must not share a
//! client (spec.md §4.6). A cache miss may race under concurrent requests; at most one
//! construction "wins" and the rest discard their duplicate, which `dashmap`'s entry API
//! gives us without any extra locking (spec.md §5).

use std::hash::{Hash, Hasher};

use config::ProviderConfig;
use dashmap::DashMap;

use crate::http_client::build_client;

#[derive(Debug, Default)]
pub struct ClientCache {
    clients: DashMap<CacheKey, reqwest::Client>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey(u64, String);

impl ClientCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(&self, provider: &ProviderConfig, model: &str) -> reqwest::Client {
        let key = CacheKey(hash_of(provider), model.to_string());

        if let Some(client) = self.clients.get(&key) {
            return client.clone();
        }

        let timeouts = provider.timeouts_ms.unwrap_or_default();
        let client = build_client(timeouts);
        self.clients.entry(key).or_insert(client).clone()
    }
}

fn hash_of(provider: &ProviderConfig) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    provider.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use config::{AdapterKind, TimeoutsConfig};

    fn provider(name: &str) -> ProviderConfig {
        ProviderConfig {
            name: name.to_string(),
            base_url: Url::parse("https://api.openai.com").unwrap(),
            adapter: AdapterKind::Openai,
            api_key_env: None,
            tools: None,
            timeouts_ms: None,
        }
    }

    #[test]
    fn distinct_providers_with_same_base_url_get_distinct_cache_entries() {
        let cache = ClientCache::new();
        let mut a = provider("a");
        let mut b = provider("b");
        a.timeouts_ms = Some(TimeoutsConfig {
            connect_ms: 1_000,
            read_ms: 1_000,
        });
        b.timeouts_ms = Some(TimeoutsConfig {
            connect_ms: 2_000,
            read_ms: 2_000,
        });

        cache.get_or_build(&a, "gpt-5");
        cache.get_or_build(&b, "gpt-5");

        assert_eq!(cache.clients.len(), 2);
    }

    #[test]
    fn same_provider_and_model_reuses_the_cached_client() {
        let cache = ClientCache::new();
        let provider = provider("openai");

        cache.get_or_build(&provider, "gpt-5");
        cache.get_or_build(&provider, "gpt-5");

        assert_eq!(cache.clients.len(), 1);
    }
}
