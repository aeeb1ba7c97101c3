//! Call metadata and the metadata predicate.
//!
//! A stub declares metadata as `key -> "v1, v2"`. A call carries metadata as
//! `key -> [v1, v2]`. For every declared key the two value lists must be the
//! same multiset; undeclared keys on the call are ignored.

use crate::stub::StubRequest;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while building metadata from user input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("metadata entry {0:?} must have the form key=value")]
    MissingSeparator(String),
    #[error("metadata key cannot be empty")]
    EmptyKey,
}

/// Multi-valued call metadata. Keys are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataMap {
    entries: HashMap<String, Vec<String>>,
}

impl MetadataMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(key, value)` pairs; repeated keys accumulate values in order.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut map = Self::new();
        for (key, value) in pairs {
            map.append(key.as_ref(), value);
        }
        map
    }

    /// Build from already grouped headers.
    pub fn from_headers(headers: &HashMap<String, Vec<String>>) -> Self {
        let mut map = Self::new();
        for (key, values) in headers {
            for value in values {
                map.append(key, value.clone());
            }
        }
        map
    }

    /// Add a value under `key`, after any existing values.
    pub fn append(&mut self, key: &str, value: impl Into<String>) {
        self.entries
            .entry(key.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// All values sent under `key`, empty when the key is absent.
    pub fn get(&self, key: &str) -> &[String] {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a `key=value` pair as given on the command line.
    pub fn parse_pair(raw: &str) -> Result<(String, String), MetadataError> {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| MetadataError::MissingSeparator(raw.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(MetadataError::EmptyKey);
        }
        Ok((key.to_string(), value.to_string()))
    }
}

/// Per-call context handed to the matcher.
///
/// `metadata` is `None` when the call arrived without any metadata at all,
/// which is distinct from an empty map.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    metadata: Option<MetadataMap>,
}

impl CallContext {
    /// A call without metadata.
    pub fn empty() -> Self {
        Self { metadata: None }
    }

    pub fn with_metadata(metadata: MetadataMap) -> Self {
        Self {
            metadata: Some(metadata),
        }
    }

    pub fn metadata(&self) -> Option<&MetadataMap> {
        self.metadata.as_ref()
    }
}

/// Expand a declared value into its comma-separated alternatives.
///
/// Tokens are trimmed but otherwise kept as is, empty ones and duplicates included.
pub fn expected_values(raw: &str) -> Vec<String> {
    raw.split(',').map(|part| part.trim().to_string()).collect()
}

/// Whether the call metadata satisfies every metadata constraint of `request`.
pub fn metadata_matches(request: &StubRequest, ctx: &CallContext) -> bool {
    if request.metadata.is_empty() {
        return true;
    }

    let Some(metadata) = ctx.metadata() else {
        return false;
    };

    request.metadata.iter().all(|(key, declared)| {
        let mut expected = expected_values(declared);
        let mut actual = metadata.get(key).to_vec();
        expected.sort();
        actual.sort();
        expected.join(",") == actual.join(",")
    })
}
