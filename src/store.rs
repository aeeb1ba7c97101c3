//! Stub store.
//!
//! The matcher reads stubs through [`StubStore`]. [`InMemoryStubStore`] keeps
//! an immutable map behind an `ArcSwap`: readers take a snapshot without
//! locking, writers publish a fresh map.

use crate::config::StubsConfig;
use crate::stub::Stub;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Immutable, ordered candidates for one method.
pub type StubList = Arc<Vec<Arc<Stub>>>;

/// Read access to registered stubs.
pub trait StubStore: Send + Sync {
    /// Candidates registered for `full_method`, in registration order.
    ///
    /// `None` when nothing is registered. The returned list is a snapshot and
    /// does not change while the caller holds it.
    fn stubs_for_method(&self, full_method: &str) -> Option<StubList>;
}

type MethodMap = HashMap<String, StubList>;

/// Copy-on-write in-memory store.
#[derive(Default)]
pub struct InMemoryStubStore {
    methods: ArcSwap<MethodMap>,
}

impl InMemoryStubStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from `(method, stub)` pairs, keeping their order per method.
    pub fn from_stubs<I>(stubs: I) -> Self
    where
        I: IntoIterator<Item = (String, Stub)>,
    {
        Self {
            methods: ArcSwap::from_pointee(group_by_method(stubs)),
        }
    }

    /// Build a store from the enabled stubs of a stub file.
    pub fn from_config(config: &StubsConfig) -> Self {
        let store = Self::from_stubs(config.to_stubs());
        info!(
            methods = store.method_count(),
            stubs = store.stub_count(),
            "Stub store loaded"
        );
        store
    }

    /// Append a stub after those already registered for `method`.
    pub fn register(&self, method: impl Into<String>, stub: Stub) {
        let method = method.into();
        let stub = Arc::new(stub);
        self.methods.rcu(|current| {
            let mut next = MethodMap::clone(current);
            let mut list = next
                .get(&method)
                .map(|existing| Vec::clone(existing))
                .unwrap_or_default();
            list.push(Arc::clone(&stub));
            next.insert(method.clone(), Arc::new(list));
            next
        });
        debug!(method = %method, stub_id = stub.label(), "Stub registered");
    }

    /// Atomically replace every registered stub.
    pub fn replace_all<I>(&self, stubs: I)
    where
        I: IntoIterator<Item = (String, Stub)>,
    {
        self.methods.store(Arc::new(group_by_method(stubs)));
        info!(
            methods = self.method_count(),
            stubs = self.stub_count(),
            "Stub store replaced"
        );
    }

    /// Drop all stubs for `method`. Returns whether any were registered.
    pub fn remove_method(&self, method: &str) -> bool {
        let mut removed = false;
        self.methods.rcu(|current| {
            let mut next = MethodMap::clone(current);
            removed = next.remove(method).is_some();
            next
        });
        removed
    }

    pub fn method_count(&self) -> usize {
        self.methods.load().len()
    }

    pub fn stub_count(&self) -> usize {
        self.methods.load().values().map(|list| list.len()).sum()
    }
}

impl StubStore for InMemoryStubStore {
    fn stubs_for_method(&self, full_method: &str) -> Option<StubList> {
        self.methods
            .load()
            .get(full_method)
            .filter(|list| !list.is_empty())
            .cloned()
    }
}

fn group_by_method<I>(stubs: I) -> MethodMap
where
    I: IntoIterator<Item = (String, Stub)>,
{
    let mut grouped: HashMap<String, Vec<Arc<Stub>>> = HashMap::new();
    for (method, stub) in stubs {
        grouped.entry(method).or_default().push(Arc::new(stub));
    }
    grouped
        .into_iter()
        .map(|(method, list)| (method, Arc::new(list)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &StubList) -> Vec<&str> {
        list.iter().map(|stub| stub.label()).collect()
    }

    #[test]
    fn test_unknown_method_is_none() {
        let store = InMemoryStubStore::new();
        assert!(store.stubs_for_method("Greet").is_none());
    }

    #[test]
    fn test_from_stubs_preserves_order() {
        let store = InMemoryStubStore::from_stubs(vec![
            ("Greet".to_string(), Stub::exact("{}").with_id("first")),
            ("Other".to_string(), Stub::exact("{}").with_id("other")),
            ("Greet".to_string(), Stub::exact("{}").with_id("second")),
        ]);
        let list = store.stubs_for_method("Greet").unwrap();
        assert_eq!(ids(&list), vec!["first", "second"]);
        assert_eq!(store.method_count(), 2);
        assert_eq!(store.stub_count(), 3);
    }

    #[test]
    fn test_register_appends() {
        let store = InMemoryStubStore::new();
        store.register("Greet", Stub::exact("a").with_id("a"));
        store.register("Greet", Stub::exact("b").with_id("b"));
        let list = store.stubs_for_method("Greet").unwrap();
        assert_eq!(ids(&list), vec!["a", "b"]);
    }

    #[test]
    fn test_snapshot_is_stable() {
        let store = InMemoryStubStore::new();
        store.register("Greet", Stub::exact("a").with_id("a"));
        let snapshot = store.stubs_for_method("Greet").unwrap();

        store.register("Greet", Stub::exact("b").with_id("b"));
        store.replace_all(Vec::new());

        assert_eq!(ids(&snapshot), vec!["a"]);
        assert!(store.stubs_for_method("Greet").is_none());
    }

    #[test]
    fn test_remove_method() {
        let store = InMemoryStubStore::new();
        store.register("Greet", Stub::exact("a"));
        assert!(store.remove_method("Greet"));
        assert!(!store.remove_method("Greet"));
        assert!(store.stubs_for_method("Greet").is_none());
    }

    #[test]
    fn test_from_config() {
        let config = StubsConfig::from_yaml(
            r#"
stubs:
  - id: one
    method: Greet
    request:
      match: exact
      content: {}
"#,
        )
        .unwrap();
        let store = InMemoryStubStore::from_config(&config);
        assert_eq!(store.stub_count(), 1);
    }

    #[test]
    fn test_concurrent_register_and_read() {
        let store = Arc::new(InMemoryStubStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store.register("Greet", Stub::exact(i.to_string()));
                    store.stubs_for_method("Greet").is_some()
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(store.stub_count(), 8);
    }
}
