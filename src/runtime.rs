//! Live state built from a stub file.
//!
//! Everything a reload may change sits here: the stubs, the error engine and
//! the global settings. Applying a new file swaps all three.

use crate::config::{GlobalSettings, StubsConfig};
use crate::matcher::Matcher;
use crate::store::InMemoryStubStore;
use arc_swap::ArcSwap;
use std::sync::Arc;

/// Stubs, matcher and settings for one stub file.
pub struct LiveStubs {
    store: Arc<InMemoryStubStore>,
    matcher: Matcher,
    settings: ArcSwap<GlobalSettings>,
}

impl LiveStubs {
    pub fn from_config(config: &StubsConfig) -> Self {
        let store = Arc::new(InMemoryStubStore::from_config(config));
        let matcher = Matcher::new(store.clone(), config.error_engine());
        Self {
            store,
            matcher,
            settings: ArcSwap::from_pointee(config.settings.clone()),
        }
    }

    /// Replace stubs, error engine and settings with those of `config`.
    pub fn apply(&self, config: &StubsConfig) {
        self.store.replace_all(config.to_stubs());
        self.matcher.set_error_engine(config.error_engine());
        self.settings.store(Arc::new(config.settings.clone()));
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn store(&self) -> &InMemoryStubStore {
        &self.store
    }

    /// Settings currently in effect.
    pub fn settings(&self) -> Arc<GlobalSettings> {
        self.settings.load_full()
    }
}
