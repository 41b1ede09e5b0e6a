//! Authorization gate: single-flight, cache-on-success, reset-on-failure
//!
//! What this module provides
//! - `AuthorizationGate<A>` wrapping an [`Authorize`] operation behind `acquire()`
//!
//! States
//! - `Idle`: nothing has succeeded yet and nothing is in flight
//! - `Pending { attempt }`: one round is in flight; every caller attaches to it
//! - `Authorized { attempt }`: a round succeeded; its grant is replayed forever
//!
//! Transitions
//! - `acquire()` on `Idle` invokes the authorizer once and moves to `Pending`
//! - the round settles `Ok` -> `Authorized`, `Err` -> `Idle`
//! - the notifier runs after the state change and before waiters observe the outcome
//!
//! Implementation strategy
//! - The slot is a `std::sync::Mutex` that is never held across an `.await`
//! - A round is a `futures::future::Shared` future; its output is cloned to every waiter
//! - The round holds a `Weak` handle to the gate so a dropped gate does not leak
//!
//! Testing strategy
//! - Scripted authorizers (fail, fail, succeed) with invocation counters
//! - Concurrent callers created before the first poll, joined with `join_all`

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::future::{self, BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use tower::BoxError;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::authorizer::Authorize;
use crate::config::GateConfig;
use crate::error::{GateError, Result};
use crate::notify::{NoNotify, Notify};

/// Future returned by [`AuthorizationGate::acquire`].
pub type Acquire<T> = BoxFuture<'static, Result<T>>;

type Round<T> = Shared<BoxFuture<'static, Result<T>>>;

enum Slot<T> {
    Idle,
    Pending { attempt: u64, round: Round<T> },
    Authorized { attempt: u64, grant: T },
}

/// Observable state of a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateStatus {
    Idle,
    Pending { attempt: u64 },
    Authorized { attempt: u64 },
}

/// Snapshot of a gate's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStats {
    /// Invocations of the underlying operation
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    /// Calls that attached to a round started by someone else
    pub joined: u64,
    /// Calls answered from the cached grant
    pub replayed: u64,
}

#[derive(Default)]
struct Counters {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    joined: AtomicU64,
    replayed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> GateStats {
        GateStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            joined: self.joined.load(Ordering::Relaxed),
            replayed: self.replayed.load(Ordering::Relaxed),
        }
    }
}

struct GateInner<A: Authorize> {
    authorizer: A,
    config: GateConfig,
    notify: Arc<dyn Notify<A::Grant>>,
    slot: Mutex<Slot<A::Grant>>,
    counters: Counters,
}

impl<A: Authorize> GateInner<A> {
    fn lock_slot(&self) -> MutexGuard<'_, Slot<A::Grant>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Invoke the authorizer and wrap the invocation into a shareable round.
    fn start_round(this: &Arc<Self>, attempt: u64) -> Round<A::Grant> {
        // a panicking authorizer settles as a failure instead of poisoning the round
        let invocation = AssertUnwindSafe(this.authorizer.authorize())
            .catch_unwind()
            .map(move |caught| match caught {
                Ok(result) => result,
                Err(_) => {
                    error!(attempt, "authorizer panicked");
                    Err::<A::Grant, BoxError>("authorizer panicked".into())
                }
            });
        let timeout = this.config.attempt_timeout.filter(|after| !after.is_zero());
        let gate = Arc::downgrade(this);
        let span = info_span!("authorization_gate", gate = %this.config.name, attempt);
        debug!(gate = %this.config.name, attempt, "starting authorization attempt");

        async move {
            let outcome = match timeout {
                Some(after) => match tokio::time::timeout(after, invocation).await {
                    Ok(result) => result.map_err(|e| GateError::failed(attempt, e)),
                    Err(_) => Err(GateError::TimedOut { attempt, after }),
                },
                None => invocation
                    .await
                    .map_err(|e| GateError::failed(attempt, e)),
            };
            if let Some(gate) = Weak::upgrade(&gate) {
                gate.settle(attempt, &outcome).await;
            }
            outcome
        }
        .instrument(span)
        .boxed()
        .shared()
    }

    async fn settle(&self, attempt: u64, outcome: &Result<A::Grant>) {
        {
            let mut slot = self.lock_slot();
            match outcome {
                Ok(grant) => {
                    *slot = Slot::Authorized {
                        attempt,
                        grant: grant.clone(),
                    };
                    self.counters.successes.fetch_add(1, Ordering::Relaxed);
                    info!(gate = %self.config.name, attempt, "authorization granted");
                }
                Err(error) => {
                    if matches!(&*slot, Slot::Pending { attempt: current, .. } if *current == attempt)
                    {
                        *slot = Slot::Idle;
                    }
                    self.counters.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(gate = %self.config.name, attempt, %error, "authorization failed, gate reset");
                }
            }
        }

        match outcome {
            Ok(grant) => self.notify.authorized(attempt, grant).await,
            Err(error) => self.notify.failed(attempt, error).await,
        }
    }
}

/// Single-flight gate around an asynchronous authorization operation.
///
/// Clones share the same state.
pub struct AuthorizationGate<A: Authorize> {
    inner: Arc<GateInner<A>>,
}

impl<A: Authorize> Clone for AuthorizationGate<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A: Authorize> fmt::Debug for AuthorizationGate<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationGate")
            .field("name", &self.inner.config.name)
            .field("status", &self.status())
            .finish()
    }
}

impl<A: Authorize> AuthorizationGate<A> {
    /// Gate with default configuration and no notifier.
    pub fn new(authorizer: A) -> Self {
        Self::builder(authorizer).build()
    }

    pub fn with_config(authorizer: A, config: GateConfig) -> Self {
        Self::builder(authorizer).config(config).build()
    }

    pub fn builder(authorizer: A) -> GateBuilder<A> {
        GateBuilder {
            authorizer,
            config: GateConfig::default(),
            notify: Arc::new(NoNotify),
        }
    }

    /// Obtain the grant, starting, joining, or replaying a round as needed.
    ///
    /// The decision is taken when `acquire` is called, not when the returned
    /// future is first polled.
    pub fn acquire(&self) -> Acquire<A::Grant> {
        let name = &self.inner.config.name;
        let mut slot = self.inner.lock_slot();
        match &*slot {
            Slot::Authorized { attempt, grant } => {
                self.inner.counters.replayed.fetch_add(1, Ordering::Relaxed);
                debug!(gate = %name, attempt = *attempt, "replaying cached authorization");
                return future::ready(Ok(grant.clone())).boxed();
            }
            Slot::Pending { attempt, round } => {
                self.inner.counters.joined.fetch_add(1, Ordering::Relaxed);
                debug!(gate = %name, attempt = *attempt, "joining pending authorization");
                return round.clone().boxed();
            }
            Slot::Idle => {}
        }

        let attempt = self.inner.counters.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        let round = GateInner::start_round(&self.inner, attempt);
        *slot = Slot::Pending {
            attempt,
            round: round.clone(),
        };
        round.boxed()
    }

    pub fn status(&self) -> GateStatus {
        match &*self.inner.lock_slot() {
            Slot::Idle => GateStatus::Idle,
            Slot::Pending { attempt, .. } => GateStatus::Pending { attempt: *attempt },
            Slot::Authorized { attempt, .. } => GateStatus::Authorized { attempt: *attempt },
        }
    }

    pub fn is_authorized(&self) -> bool {
        matches!(self.status(), GateStatus::Authorized { .. })
    }

    /// The cached grant, without starting a round.
    pub fn cached(&self) -> Option<A::Grant> {
        match &*self.inner.lock_slot() {
            Slot::Authorized { grant, .. } => Some(grant.clone()),
            _ => None,
        }
    }

    pub fn stats(&self) -> GateStats {
        self.inner.counters.snapshot()
    }

    pub fn config(&self) -> &GateConfig {
        &self.inner.config
    }
}

/// Builder for [`AuthorizationGate`].
pub struct GateBuilder<A: Authorize> {
    authorizer: A,
    config: GateConfig,
    notify: Arc<dyn Notify<A::Grant>>,
}

impl<A: Authorize> GateBuilder<A> {
    pub fn config(mut self, config: GateConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn notify<N>(mut self, notify: N) -> Self
    where
        N: Notify<A::Grant>,
    {
        self.notify = Arc::new(notify);
        self
    }

    pub fn build(self) -> AuthorizationGate<A> {
        AuthorizationGate {
            inner: Arc::new(GateInner {
                authorizer: self.authorizer,
                config: self.config,
                notify: self.notify,
                slot: Mutex::new(Slot::Idle),
                counters: Counters::default(),
            }),
        }
    }
}
