//! Stub domain types.

use crate::error_engine::RpcStatus;
use crate::metadata::{metadata_matches, CallContext};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// A registered response stub.
///
/// The method a stub answers is the key it is stored under, not a field.
#[derive(Debug, Clone, Serialize)]
pub struct Stub {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub request: StubRequest,
    pub response: StubResponse,
}

impl Stub {
    /// Stub matching `content` exactly, with no metadata constraints.
    pub fn exact(content: impl Into<String>) -> Self {
        Self {
            id: None,
            name: None,
            request: StubRequest {
                strategy: MatchStrategy::Exact,
                content: content.into(),
                metadata: HashMap::new(),
            },
            response: StubResponse::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_strategy(mut self, strategy: MatchStrategy) -> Self {
        self.request.strategy = strategy;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_response(mut self, response: StubResponse) -> Self {
        self.response = response;
        self
    }

    /// Label used in logs: the id, else the name.
    pub fn label(&self) -> &str {
        self.id
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("<unnamed>")
    }

    /// Whether this stub accepts the call.
    pub fn accepts(&self, payload: &str, ctx: &CallContext) -> bool {
        self.request.strategy.evaluate(&self.request, payload, ctx)
    }
}

/// Request side of a stub: how to recognise a call.
#[derive(Debug, Clone, Serialize)]
pub struct StubRequest {
    #[serde(rename = "match")]
    pub strategy: MatchStrategy,
    /// Expected serialized request payload.
    pub content: String,
    /// Declared metadata; each value may list comma-separated alternatives.
    pub metadata: HashMap<String, String>,
}

/// Canned reply carried along for the server. Matching never looks at it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StubResponse {
    pub content: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcStatus>,
}

/// How a stub compares an incoming payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Byte-identical payload plus metadata predicate.
    Exact,
    /// Subset matching. Not implemented: never matches.
    Partial,
    /// Unrecognised discriminator, kept verbatim. Never matches.
    Unsupported(String),
}

impl MatchStrategy {
    /// Parse a discriminator. Never fails; unknown values become `Unsupported`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "exact" => MatchStrategy::Exact,
            "partial" => MatchStrategy::Partial,
            other => MatchStrategy::Unsupported(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MatchStrategy::Exact => "exact",
            MatchStrategy::Partial => "partial",
            MatchStrategy::Unsupported(raw) => raw,
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, MatchStrategy::Exact)
    }

    /// Evaluate this strategy for one stub against one call.
    pub fn evaluate(&self, request: &StubRequest, payload: &str, ctx: &CallContext) -> bool {
        match self {
            MatchStrategy::Exact => request.content == payload && metadata_matches(request, ctx),
            MatchStrategy::Partial => false,
            MatchStrategy::Unsupported(_) => false,
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MatchStrategy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
