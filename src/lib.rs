//! gRPC Stub Matcher
//!
//! The decision engine of a gRPC mock server: given a call's method, its
//! serialized request and its metadata, find the registered stub that
//! answers it, or report that none does.
//!
//! # Features
//!
//! - **Exact Matching**: Byte-for-byte payload comparison
//! - **Metadata Predicates**: Multi-valued, order-insensitive metadata checks
//! - **First Match Wins**: Stubs are tried in registration order
//! - **Hot Reload**: Lock-free stub snapshots replaced when the file changes
//! - **Error Engine**: Pluggable status for calls that match nothing
//!
//! # Example Configuration
//!
//! ```yaml
//! stubs:
//!   - id: greet-x
//!     method: /helloworld.Greeter/SayHello
//!     request:
//!       match: exact
//!       content: {"name": "x"}
//!       metadata:
//!         env: "prod, staging"
//!     response:
//!       content:
//!         message: "Hello x"
//! ```

pub mod config;
pub mod error_engine;
pub mod matcher;
pub mod metadata;
pub mod runtime;
pub mod store;
pub mod stub;
pub mod watch;

pub use config::StubsConfig;
pub use error_engine::{CustomErrorEngine, ErrorEngine, RpcStatus};
pub use matcher::{Matcher, Resolution, StubsMatcher};
pub use metadata::{CallContext, MetadataMap};
pub use runtime::LiveStubs;
pub use store::{InMemoryStubStore, StubStore};
pub use stub::{MatchStrategy, Stub};
