//! Error engine handle.
//!
//! When no stub matches a call, the surrounding server asks an error engine
//! what status to send back. The matcher only carries the handle around.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Canonical gRPC status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Code {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl Code {
    /// Numeric value as sent in the `grpc-status` trailer.
    pub fn as_i32(self) -> i32 {
        match self {
            Code::Ok => 0,
            Code::Cancelled => 1,
            Code::Unknown => 2,
            Code::InvalidArgument => 3,
            Code::DeadlineExceeded => 4,
            Code::NotFound => 5,
            Code::AlreadyExists => 6,
            Code::PermissionDenied => 7,
            Code::ResourceExhausted => 8,
            Code::FailedPrecondition => 9,
            Code::Aborted => 10,
            Code::OutOfRange => 11,
            Code::Unimplemented => 12,
            Code::Internal => 13,
            Code::Unavailable => 14,
            Code::DataLoss => 15,
            Code::Unauthenticated => 16,
        }
    }
}

/// A synthetic RPC status (code plus message).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RpcStatus {
    pub code: Code,
    #[serde(default)]
    pub message: String,
}

impl RpcStatus {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for RpcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({}): {}", self.code, self.code.as_i32(), self.message)
    }
}

/// Policy deciding what to return to the client when nothing matched.
pub trait CustomErrorEngine: Send + Sync + fmt::Debug {
    fn unmatched(&self, full_method: &str, payload: &str) -> RpcStatus;
}

/// Shared handle to an error engine.
pub type ErrorEngine = Arc<dyn CustomErrorEngine>;

/// Answers every unmatched call with `NOT_FOUND`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFoundErrorEngine;

impl CustomErrorEngine for NotFoundErrorEngine {
    fn unmatched(&self, full_method: &str, _payload: &str) -> RpcStatus {
        RpcStatus::new(
            Code::NotFound,
            format!("no stub matched the request for {}", full_method),
        )
    }
}

/// Answers every unmatched call with one configured status.
#[derive(Debug, Clone)]
pub struct StaticErrorEngine {
    status: RpcStatus,
}

impl StaticErrorEngine {
    pub fn new(status: RpcStatus) -> Self {
        Self { status }
    }
}

impl CustomErrorEngine for StaticErrorEngine {
    fn unmatched(&self, _full_method: &str, _payload: &str) -> RpcStatus {
        self.status.clone()
    }
}
