use std::{path::Path, sync::Arc};

use arc_swap::ArcSwap;

use crate::Config;

/// Holds the active configuration behind an atomically-swappable reference.
///
/// A request captures [`ConfigStore::current`] once at entry; a reload that
/// races with an in-flight request never mutates the snapshot that request
/// already holds (it either sees the whole old config or the whole new one).
/// No lock is held across request processing.
#[derive(Debug)]
pub struct ConfigStore {
    current: ArcSwap<Config>,
}

impl ConfigStore {
    pub fn new(config: Config) -> Self {
        Self {
            current: ArcSwap::new(Arc::new(config)),
        }
    }

    /// Returns the config snapshot active at the moment of the call.
    pub fn current(&self) -> Arc<Config> {
        self.current.load_full()
    }

    /// Parses `path` in isolation and, only if it validates successfully,
    /// atomically swaps it in as the active config. On failure the previous
    /// config is retained and the error is returned (and should be logged by
    /// the caller, typically a file-watch loop outside this crate).
    pub fn reload<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let config = Config::load(path)?;
        self.current.store(Arc::new(config));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_swaps_on_success_only() {
        let store = ConfigStore::new(Config::default());
        assert_eq!(store.current().log_level, "info");

        let err = store.reload("/nonexistent/path/to/config.yaml").unwrap_err();
        assert!(err.to_string().len() > 0);
        // Failed reload must not have touched the active snapshot.
        assert_eq!(store.current().log_level, "info");
    }
}
