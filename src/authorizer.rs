//! The operation a gate guards
//!
//! An authorizer is a zero-argument asynchronous operation that either yields
//! a grant or fails with an opaque reason. Two adapters cover the usual
//! shapes: a plain closure returning a future, and a Tower `Service<()>`.

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::Mutex;
use tower::{BoxError, Service, ServiceExt};

/// Asynchronous authorization operation guarded by an [`AuthorizationGate`].
///
/// Every call to [`authorize`](Authorize::authorize) is one invocation of the
/// underlying operation. The returned future must own everything it needs.
///
/// [`AuthorizationGate`]: crate::gate::AuthorizationGate
pub trait Authorize: Send + Sync + 'static {
    /// Value produced on success and replayed from cache afterwards.
    type Grant: Clone + Send + Sync + 'static;

    /// Called while the gate's state is locked; it must not call back into
    /// the same gate before returning its future.
    fn authorize(&self) -> BoxFuture<'static, Result<Self::Grant, BoxError>>;
}

impl<A> Authorize for Arc<A>
where
    A: Authorize + ?Sized,
{
    type Grant = A::Grant;

    fn authorize(&self) -> BoxFuture<'static, Result<Self::Grant, BoxError>> {
        (**self).authorize()
    }
}

/// Authorizer backed by a closure returning a future.
#[derive(Clone)]
pub struct FnAuthorizer<F> {
    f: F,
}

/// Build an authorizer from `Fn() -> impl Future<Output = Result<T, E>>`.
pub fn authorize_fn<F, Fut, T, E>(f: F) -> FnAuthorizer<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Into<BoxError>,
{
    FnAuthorizer { f }
}

impl<F, Fut, T, E> Authorize for FnAuthorizer<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Into<BoxError>,
{
    type Grant = T;

    fn authorize(&self) -> BoxFuture<'static, Result<T, BoxError>> {
        (self.f)().map(|r| r.map_err(Into::into)).boxed()
    }
}

/// Authorizer backed by a Tower service called with `()`.
///
/// The service is shared behind an async mutex so readiness and the call are
/// driven together, one attempt at a time.
pub struct ServiceAuthorizer<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for ServiceAuthorizer<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Build an authorizer from a `Service<()>`.
pub fn authorize_service<S>(svc: S) -> ServiceAuthorizer<S>
where
    S: Service<(), Error = BoxError> + Send + 'static,
{
    ServiceAuthorizer {
        inner: Arc::new(Mutex::new(svc)),
    }
}

impl<S> Authorize for ServiceAuthorizer<S>
where
    S: Service<(), Error = BoxError> + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Clone + Send + Sync + 'static,
{
    type Grant = S::Response;

    fn authorize(&self) -> BoxFuture<'static, Result<S::Response, BoxError>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.lock().await;
            ServiceExt::ready(&mut *guard).await?.call(()).await
        })
    }
}
