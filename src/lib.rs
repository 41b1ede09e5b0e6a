//! # tower-authgate
//!
//! A single-flight, cache-on-success authorization gate built as Tower middleware.
//!
//! Asking for a permission, a token, or a session is usually an asynchronous
//! call that should happen once. The gate wraps that call so that:
//!
//! - concurrent callers share one in-flight attempt and all observe its outcome,
//! - a success is cached forever and replayed without calling again,
//! - a failure is surfaced to everyone waiting and then forgotten, so the next
//!   caller starts a fresh attempt.
//!
//! ## Core Concepts
//!
//! - **Authorizer**: the guarded operation, a closure or a `Service<()>` ([`authorizer`])
//! - **Gate**: [`AuthorizationGate`] with its `acquire()` accessor ([`gate`])
//! - **Layers**: Tower adapters exposing the gate and guarding downstream services ([`layer`])
//! - **Notify**: a success/failure sink fired once per settled round ([`notify`])
//!
//! ## Getting Started
//!
//! ```rust
//! use tower_authgate::{authorize_fn, AuthorizationGate, BoxError};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let gate = AuthorizationGate::new(authorize_fn(|| async {
//!     // ask the platform, a token endpoint, the user...
//!     Ok::<_, BoxError>("granted".to_string())
//! }));
//!
//! let first = gate.acquire().await?;
//! let again = gate.acquire().await?; // replayed, no second request
//! assert_eq!(first, again);
//! # Ok(())
//! # }
//! ```

pub mod authorizer;
pub mod config;
pub mod error;
pub mod gate;
pub mod layer;
pub mod notify;

pub use authorizer::{authorize_fn, authorize_service, Authorize, FnAuthorizer, ServiceAuthorizer};
pub use config::{ConfigBuilder, GateConfig};
pub use error::{GateError, Result};
pub use gate::{Acquire, AuthorizationGate, GateBuilder, GateStats, GateStatus};
pub use layer::{
    AuthorizationGateLayer, Authorized, RequireAuthorization, RequireAuthorizationLayer,
};
pub use notify::{Callbacks, EventCollector, EventSink, GateEvent, NoNotify, Notify};

// Re-export Tower traits that users need
pub use tower::{BoxError, Layer, Service, ServiceExt};
