//! Stub definition files.
//!
//! Stubs are declared in YAML, grouped under the RPC method they answer.

use crate::error_engine::{ErrorEngine, NotFoundErrorEngine, RpcStatus, StaticErrorEngine};
use crate::stub::{MatchStrategy, Stub, StubRequest, StubResponse};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Errors raised while loading stub definitions.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid stub file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("stub {index}: {reason}")]
    Invalid { index: usize, reason: String },
}

/// Top-level stub file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct StubsConfig {
    /// Stub definitions, in registration order
    #[serde(default)]
    pub stubs: Vec<StubDefinition>,

    /// Global settings
    #[serde(default)]
    pub settings: GlobalSettings,
}

impl StubsConfig {
    /// Load and validate a YAML stub file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every stub definition.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, stub) in self.stubs.iter().enumerate() {
            stub.validate(self.settings.strict_match)
                .map_err(|reason| ConfigError::Invalid { index, reason })?;
        }
        Ok(())
    }

    /// Enabled stubs as `(method, stub)` pairs, in file order.
    pub fn to_stubs(&self) -> Vec<(String, Stub)> {
        self.stubs
            .iter()
            .filter(|def| def.enabled)
            .map(|def| (def.method.clone(), def.to_stub()))
            .collect()
    }

    /// Error engine selected by the settings.
    pub fn error_engine(&self) -> ErrorEngine {
        match &self.settings.default_error {
            Some(status) => Arc::new(StaticErrorEngine::new(status.clone())),
            None => Arc::new(NotFoundErrorEngine),
        }
    }
}

/// A single stub definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StubDefinition {
    /// Optional identifier, used in logs
    #[serde(default)]
    pub id: Option<String>,

    /// Optional name/description
    #[serde(default)]
    pub name: Option<String>,

    /// Fully-qualified RPC method, e.g. `/helloworld.Greeter/SayHello`
    pub method: String,

    /// Request matcher
    pub request: RequestDefinition,

    /// Response to return
    #[serde(default)]
    pub response: ResponseDefinition,

    /// Whether this stub is registered at all
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl StubDefinition {
    /// Validate the stub definition.
    pub fn validate(&self, strict_match: bool) -> Result<(), String> {
        if self.method.trim().is_empty() {
            return Err("method cannot be empty".to_string());
        }
        if matches!(&self.id, Some(id) if id.is_empty()) {
            return Err("id cannot be empty when given".to_string());
        }

        let strategy = MatchStrategy::parse(&self.request.strategy);
        if !strategy.is_supported() {
            if strict_match {
                return Err(format!("unsupported match strategy {:?}", strategy.as_str()));
            }
            let label = self.id.as_deref().or(self.name.as_deref());
            warn!(
                method = %self.method,
                stub_id = label.unwrap_or("<unnamed>"),
                strategy = %strategy,
                "Stub uses a match strategy that never matches"
            );
        }
        Ok(())
    }

    /// Convert into the domain stub.
    pub fn to_stub(&self) -> Stub {
        Stub {
            id: self.id.clone(),
            name: self.name.clone(),
            request: StubRequest {
                strategy: MatchStrategy::parse(&self.request.strategy),
                content: self.request.content_text(),
                metadata: self.request.metadata.clone(),
            },
            response: StubResponse {
                content: self.response.content.clone(),
                error: self.response.error.clone(),
            },
        }
    }
}

/// Request matching definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestDefinition {
    /// Match strategy (`exact`, `partial`)
    #[serde(rename = "match")]
    pub strategy: String,

    /// Expected payload: a raw string, or any JSON value
    #[serde(default)]
    pub content: serde_json::Value,

    /// Metadata constraints; values may list comma-separated alternatives
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl RequestDefinition {
    /// Payload text compared against incoming requests.
    ///
    /// Strings are taken verbatim, a missing value is empty and other values
    /// are serialized compactly.
    pub fn content_text(&self) -> String {
        match &self.content {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(raw) => raw.clone(),
            other => other.to_string(),
        }
    }
}

/// Response definition.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ResponseDefinition {
    /// Response message as JSON
    #[serde(default)]
    pub content: serde_json::Value,

    /// Status to fail the call with instead of replying
    #[serde(default)]
    pub error: Option<RpcStatus>,
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSettings {
    /// Log all matched stubs
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log unmatched requests
    #[serde(default = "default_true")]
    pub log_unmatched: bool,

    /// Reject stubs with an unknown match strategy at load time
    #[serde(default)]
    pub strict_match: bool,

    /// Status returned when nothing matches (defaults to NOT_FOUND)
    #[serde(default)]
    pub default_error: Option<RpcStatus>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            log_matches: true,
            log_unmatched: true,
            strict_match: false,
            default_error: None,
        }
    }
}
