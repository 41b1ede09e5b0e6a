//! Tower adapters for the authorization gate
//!
//! What this module provides
//! - The gate as a `Service<()>` and a layer that turns an authorization service into a gate
//! - A layer that guards a downstream service behind a gate
//!
//! Exports
//! - Models
//!   - `Authorized<T, R> { grant, request }` handed to guarded services
//! - Layers
//!   - `AuthorizationGateLayer`: `S: Service<()>` -> `AuthorizationGate<ServiceAuthorizer<S>>`
//!   - `RequireAuthorizationLayer<A>`: `S: Service<Authorized<Grant, Req>>` -> `Service<Req>`
//!
//! Composition
//! - `ServiceBuilder::new().layer(AuthorizationGateLayer::new(cfg)).service(login)`
//! - `ServiceBuilder::new().layer(RequireAuthorizationLayer::new(gate)).service(upload)`
//!
//! Testing strategy
//! - Fake inner services counting calls; authorization failure must never reach the inner service

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::{BoxError, Layer, Service, ServiceExt};
use tracing::debug;

use crate::authorizer::{authorize_service, Authorize, ServiceAuthorizer};
use crate::config::GateConfig;
use crate::error::GateError;
use crate::gate::{Acquire, AuthorizationGate};

impl<A: Authorize> Service<()> for AuthorizationGate<A> {
    type Response = A::Grant;
    type Error = GateError;
    type Future = Acquire<A::Grant>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: ()) -> Self::Future {
        self.acquire()
    }
}

/// Layer producing a gate around an authorization service.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationGateLayer {
    config: GateConfig,
}

impl AuthorizationGateLayer {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for AuthorizationGateLayer
where
    S: Service<(), Error = BoxError> + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Clone + Send + Sync + 'static,
{
    type Service = AuthorizationGate<ServiceAuthorizer<S>>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthorizationGate::with_config(authorize_service(inner), self.config.clone())
    }
}

/// Request handed to a guarded service once authorization is held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorized<T, R> {
    pub grant: T,
    pub request: R,
}

/// Layer that requires authorization before every call to the inner service.
pub struct RequireAuthorizationLayer<A: Authorize> {
    gate: AuthorizationGate<A>,
}

impl<A: Authorize> Clone for RequireAuthorizationLayer<A> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
        }
    }
}

impl<A: Authorize> RequireAuthorizationLayer<A> {
    pub fn new(gate: AuthorizationGate<A>) -> Self {
        Self { gate }
    }
}

impl<S, A: Authorize> Layer<S> for RequireAuthorizationLayer<A> {
    type Service = RequireAuthorization<S, A>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireAuthorization {
            inner,
            gate: self.gate.clone(),
        }
    }
}

/// Service guarded by an [`AuthorizationGate`].
pub struct RequireAuthorization<S, A: Authorize> {
    inner: S,
    gate: AuthorizationGate<A>,
}

impl<S: Clone, A: Authorize> Clone for RequireAuthorization<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            gate: self.gate.clone(),
        }
    }
}

impl<S, A: Authorize> RequireAuthorization<S, A> {
    pub fn gate(&self) -> &AuthorizationGate<A> {
        &self.gate
    }
}

impl<S, A, Req> Service<Req> for RequireAuthorization<S, A>
where
    A: Authorize,
    S: Service<Authorized<A::Grant, Req>> + Clone + Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, request: Req) -> Self::Future {
        // keep the instance that was driven to readiness
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let acquire = self.gate.acquire();
        Box::pin(async move {
            let grant = match acquire.await {
                Ok(grant) => grant,
                Err(e) => {
                    debug!(error = %e, "request rejected, authorization unavailable");
                    return Err::<S::Response, BoxError>(e.into());
                }
            };
            let ready = ServiceExt::ready(&mut inner)
                .await
                .map_err(Into::<BoxError>::into)?;
            ready
                .call(Authorized { grant, request })
                .await
                .map_err(Into::into)
        })
    }
}
