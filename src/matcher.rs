//! Request matching logic.
//!
//! Matches incoming calls against the stubs registered for their method.

use crate::error_engine::{ErrorEngine, RpcStatus};
use crate::metadata::CallContext;
use crate::store::StubStore;
use crate::stub::{MatchStrategy, Stub};
use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Finds the stub answering a call.
pub trait StubsMatcher: Send + Sync {
    /// First stub registered for `full_method` that accepts the call, if any.
    fn match_stub(
        &self,
        ctx: &CallContext,
        full_method: &str,
        payload: &str,
    ) -> Option<Arc<Stub>>;

    /// Error engine to consult when nothing matched.
    fn error_engine(&self) -> ErrorEngine;
}

/// Outcome of [`Matcher::resolve`].
#[derive(Debug, Clone)]
pub enum Resolution {
    /// A stub accepted the call
    Matched(Arc<Stub>),
    /// Nothing matched; status chosen by the error engine
    Unmatched(RpcStatus),
}

/// Request matcher engine.
///
/// Calls never mutate it; one instance can serve any number of calls at once.
/// The error engine can be swapped on reload without blocking matches.
pub struct Matcher {
    store: Arc<dyn StubStore>,
    error_engine: ArcSwap<ErrorEngine>,
}

impl Matcher {
    /// Create a new matcher reading from `store`.
    pub fn new(store: Arc<dyn StubStore>, error_engine: ErrorEngine) -> Self {
        Self {
            store,
            error_engine: ArcSwap::from_pointee(error_engine),
        }
    }

    /// Replace the error engine used for calls that match nothing.
    pub fn set_error_engine(&self, error_engine: ErrorEngine) {
        self.error_engine.store(Arc::new(error_engine));
    }

    /// Match a call, falling back to the error engine on no match.
    pub fn resolve(&self, ctx: &CallContext, full_method: &str, payload: &str) -> Resolution {
        match self.match_stub(ctx, full_method, payload) {
            Some(stub) => Resolution::Matched(stub),
            None => Resolution::Unmatched(self.error_engine().unmatched(full_method, payload)),
        }
    }
}

impl StubsMatcher for Matcher {
    fn match_stub(
        &self,
        ctx: &CallContext,
        full_method: &str,
        payload: &str,
    ) -> Option<Arc<Stub>> {
        let Some(candidates) = self.store.stubs_for_method(full_method) else {
            debug!(method = %full_method, "No stubs registered for method");
            return None;
        };

        for stub in candidates.iter() {
            if let MatchStrategy::Unsupported(raw) = &stub.request.strategy {
                trace!(
                    method = %full_method,
                    stub_id = stub.label(),
                    strategy = %raw,
                    "Skipping stub with unsupported match strategy"
                );
                continue;
            }

            if stub.accepts(payload, ctx) {
                debug!(method = %full_method, stub_id = stub.label(), "Call matched stub");
                return Some(Arc::clone(stub));
            }
        }

        debug!(
            method = %full_method,
            candidates = candidates.len(),
            "No candidate stub matched"
        );
        None
    }

    fn error_engine(&self) -> ErrorEngine {
        ErrorEngine::clone(&self.error_engine.load())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_engine::{Code, CustomErrorEngine, NotFoundErrorEngine};
    use crate::metadata::MetadataMap;
    use crate::store::InMemoryStubStore;

    const GREET: &str = "/helloworld.Greeter/SayHello";
    const PAYLOAD: &str = r#"{"name":"x"}"#;

    fn matcher_with(stubs: Vec<Stub>) -> (Arc<InMemoryStubStore>, Matcher) {
        let store = Arc::new(InMemoryStubStore::from_stubs(
            stubs.into_iter().map(|stub| (GREET.to_string(), stub)),
        ));
        let matcher = Matcher::new(store.clone(), Arc::new(NotFoundErrorEngine));
        (store, matcher)
    }

    fn ctx(pairs: &[(&str, &str)]) -> CallContext {
        CallContext::with_metadata(MetadataMap::from_pairs(pairs.iter().copied()))
    }

    fn matched_id(matcher: &Matcher, ctx: &CallContext, payload: &str) -> Option<String> {
        matcher
            .match_stub(ctx, GREET, payload)
            .and_then(|stub| stub.id.clone())
    }

    #[test]
    fn test_no_stubs_for_method() {
        let (_, matcher) = matcher_with(vec![Stub::exact(PAYLOAD)]);
        assert!(matcher
            .match_stub(&CallContext::empty(), "/other.Svc/Call", PAYLOAD)
            .is_none());
    }

    #[test]
    fn test_exact_match_without_metadata() {
        let (_, matcher) = matcher_with(vec![Stub::exact(PAYLOAD).with_id("greet")]);
        assert_eq!(
            matched_id(&matcher, &CallContext::empty(), PAYLOAD).as_deref(),
            Some("greet")
        );
        assert_eq!(
            matched_id(&matcher, &ctx(&[("x-trace", "1")]), PAYLOAD).as_deref(),
            Some("greet")
        );
    }

    #[test]
    fn test_single_character_difference() {
        let (_, matcher) = matcher_with(vec![Stub::exact(PAYLOAD)]);
        assert!(matcher
            .match_stub(&CallContext::empty(), GREET, r#"{"name":"y"}"#)
            .is_none());
        assert!(matcher
            .match_stub(&CallContext::empty(), GREET, r#"{"name":"x"} "#)
            .is_none());
    }

    #[test]
    fn test_exact_match_with_metadata() {
        let (_, matcher) = matcher_with(vec![Stub::exact(PAYLOAD)
            .with_id("env")
            .with_metadata("env", "prod,staging")]);

        assert_eq!(
            matched_id(&matcher, &ctx(&[("env", "staging"), ("env", "prod")]), PAYLOAD)
                .as_deref(),
            Some("env")
        );
        assert!(matched_id(&matcher, &ctx(&[("env", "prod")]), PAYLOAD).is_none());
        assert!(matched_id(&matcher, &CallContext::empty(), PAYLOAD).is_none());
    }

    #[test]
    fn test_partial_never_matches() {
        let (_, matcher) =
            matcher_with(vec![Stub::exact(PAYLOAD).with_strategy(MatchStrategy::Partial)]);
        assert!(matcher
            .match_stub(&CallContext::empty(), GREET, PAYLOAD)
            .is_none());
    }

    #[test]
    fn test_unsupported_strategy_is_skipped() {
        let (_, matcher) = matcher_with(vec![
            Stub::exact(PAYLOAD)
                .with_id("broken")
                .with_strategy(MatchStrategy::parse("regex")),
            Stub::exact(PAYLOAD).with_id("good"),
        ]);
        assert_eq!(
            matched_id(&matcher, &CallContext::empty(), PAYLOAD).as_deref(),
            Some("good")
        );
    }

    #[test]
    fn test_first_match_wins() {
        let (_, matcher) = matcher_with(vec![
            Stub::exact("{}").with_id("other-payload"),
            Stub::exact(PAYLOAD).with_id("first"),
            Stub::exact(PAYLOAD).with_id("second"),
        ]);
        assert_eq!(
            matched_id(&matcher, &CallContext::empty(), PAYLOAD).as_deref(),
            Some("first")
        );
    }

    #[test]
    fn test_metadata_mismatch_falls_through() {
        let (_, matcher) = matcher_with(vec![
            Stub::exact(PAYLOAD)
                .with_id("prod-only")
                .with_metadata("env", "prod"),
            Stub::exact(PAYLOAD).with_id("fallback"),
        ]);
        assert_eq!(
            matched_id(&matcher, &ctx(&[("env", "prod")]), PAYLOAD).as_deref(),
            Some("prod-only")
        );
        assert_eq!(
            matched_id(&matcher, &ctx(&[("env", "dev")]), PAYLOAD).as_deref(),
            Some("fallback")
        );
    }

    #[test]
    fn test_sees_store_updates() {
        let (store, matcher) = matcher_with(Vec::new());
        assert!(matcher
            .match_stub(&CallContext::empty(), GREET, PAYLOAD)
            .is_none());

        store.register(GREET, Stub::exact(PAYLOAD).with_id("late"));
        assert_eq!(
            matched_id(&matcher, &CallContext::empty(), PAYLOAD).as_deref(),
            Some("late")
        );
    }

    #[derive(Debug)]
    struct Unavailable;

    impl CustomErrorEngine for Unavailable {
        fn unmatched(&self, _full_method: &str, _payload: &str) -> RpcStatus {
            RpcStatus::new(Code::Unavailable, "down")
        }
    }

    #[test]
    fn test_error_engine_is_forwarded() {
        let engine: ErrorEngine = Arc::new(Unavailable);
        let matcher = Matcher::new(Arc::new(InMemoryStubStore::new()), engine.clone());
        assert!(Arc::ptr_eq(&matcher.error_engine(), &engine));
    }

    #[test]
    fn test_set_error_engine() {
        let (_, matcher) = matcher_with(Vec::new());
        match matcher.resolve(&CallContext::empty(), GREET, PAYLOAD) {
            Resolution::Unmatched(status) => assert_eq!(status.code, Code::NotFound),
            other => panic!("Expected no match, got {:?}", other),
        }

        matcher.set_error_engine(Arc::new(Unavailable));
        match matcher.resolve(&CallContext::empty(), GREET, PAYLOAD) {
            Resolution::Unmatched(status) => assert_eq!(status.code, Code::Unavailable),
            other => panic!("Expected no match, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve() {
        let (_, matcher) = matcher_with(vec![Stub::exact(PAYLOAD).with_id("greet")]);
        match matcher.resolve(&CallContext::empty(), GREET, PAYLOAD) {
            Resolution::Matched(stub) => assert_eq!(stub.label(), "greet"),
            other => panic!("Expected match, got {:?}", other),
        }
        match matcher.resolve(&CallContext::empty(), GREET, "{}") {
            Resolution::Unmatched(status) => assert_eq!(status.code, Code::NotFound),
            other => panic!("Expected no match, got {:?}", other),
        }
    }

    #[test]
    fn test_concurrent_matching() {
        let (_, matcher) = matcher_with(vec![Stub::exact(PAYLOAD).with_id("greet")]);
        let matcher = Arc::new(matcher);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let matcher = Arc::clone(&matcher);
                std::thread::spawn(move || {
                    matcher
                        .match_stub(&CallContext::empty(), GREET, PAYLOAD)
                        .map(|stub| stub.label().to_string())
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().as_deref(), Some("greet"));
        }
    }
}
