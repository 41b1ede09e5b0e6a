//! Outcome notification
//!
//! What this module provides
//! - A success/failure sink invoked once per settled round, after the gate
//!   state has been updated
//!
//! Exports
//! - Models
//!   - `GateEvent::{Authorized { gate, attempt, at }, Failed { gate, attempt, reason, at }}`
//! - Sinks
//!   - `Notify<T>` trait with `authorized` and `failed`
//!   - `NoNotify` (default), `Callbacks` (closure pair), `EventSink<C>` where `C: EventCollector`
//! - Services
//!   - `EventCollector: Service<GateEvent, Response = ()>`
//!
//! Testing strategy
//! - Closure pair recording into shared vectors; a `service_fn` collector capturing events

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower::{BoxError, Service, ServiceExt};
use tracing::warn;

use crate::error::GateError;

/// Receives the outcome of each settled round.
#[async_trait]
pub trait Notify<T>: Send + Sync + 'static
where
    T: Send + Sync + 'static,
{
    async fn authorized(&self, attempt: u64, grant: &T);

    async fn failed(&self, attempt: u64, error: &GateError);
}

/// Sink that ignores every outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNotify;

#[async_trait]
impl<T: Send + Sync + 'static> Notify<T> for NoNotify {
    async fn authorized(&self, _attempt: u64, _grant: &T) {}

    async fn failed(&self, _attempt: u64, _error: &GateError) {}
}

type OnSuccess<T> = Arc<dyn Fn(u64, &T) + Send + Sync>;
type OnFailure = Arc<dyn Fn(u64, &GateError) + Send + Sync>;

/// Synchronous success/failure callback pair.
pub struct Callbacks<T> {
    on_success: OnSuccess<T>,
    on_failure: OnFailure,
}

impl<T> Clone for Callbacks<T> {
    fn clone(&self) -> Self {
        Self {
            on_success: self.on_success.clone(),
            on_failure: self.on_failure.clone(),
        }
    }
}

impl<T> Callbacks<T> {
    pub fn new<S, F>(on_success: S, on_failure: F) -> Self
    where
        S: Fn(u64, &T) + Send + Sync + 'static,
        F: Fn(u64, &GateError) + Send + Sync + 'static,
    {
        Self {
            on_success: Arc::new(on_success),
            on_failure: Arc::new(on_failure),
        }
    }
}

#[async_trait]
impl<T> Notify<T> for Callbacks<T>
where
    T: Send + Sync + 'static,
{
    async fn authorized(&self, attempt: u64, grant: &T) {
        (self.on_success)(attempt, grant);
    }

    async fn failed(&self, attempt: u64, error: &GateError) {
        (self.on_failure)(attempt, error);
    }
}

/// Record of a settled round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GateEvent {
    Authorized {
        gate: String,
        attempt: u64,
        at: DateTime<Utc>,
    },
    Failed {
        gate: String,
        attempt: u64,
        reason: String,
        at: DateTime<Utc>,
    },
}

impl GateEvent {
    pub fn attempt(&self) -> u64 {
        match self {
            GateEvent::Authorized { attempt, .. } | GateEvent::Failed { attempt, .. } => *attempt,
        }
    }

    pub fn is_authorized(&self) -> bool {
        matches!(self, GateEvent::Authorized { .. })
    }
}

/// Collector service alias: Service<GateEvent, Response = ()>.
pub trait EventCollector: Service<GateEvent, Response = (), Error = BoxError> {}
impl<T> EventCollector for T where T: Service<GateEvent, Response = (), Error = BoxError> {}

/// Sink that forwards each outcome as a [`GateEvent`] to a collector service.
pub struct EventSink<C> {
    gate: String,
    collector: C,
}

impl<C> EventSink<C> {
    pub fn new(gate: impl Into<String>, collector: C) -> Self {
        Self {
            gate: gate.into(),
            collector,
        }
    }

    async fn emit(&self, event: GateEvent)
    where
        C: EventCollector + Clone + Send + Sync + 'static,
        C::Future: Send,
    {
        let mut collector = self.collector.clone();
        let attempt = event.attempt();
        let result = match ServiceExt::ready(&mut collector).await {
            Ok(ready) => ready.call(event).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(gate = %self.gate, attempt, error = %e, "event collector rejected gate event");
        }
    }
}

#[async_trait]
impl<T, C> Notify<T> for EventSink<C>
where
    T: Send + Sync + 'static,
    C: EventCollector + Clone + Send + Sync + 'static,
    C::Future: Send,
{
    async fn authorized(&self, attempt: u64, _grant: &T) {
        self.emit(GateEvent::Authorized {
            gate: self.gate.clone(),
            attempt,
            at: Utc::now(),
        })
        .await;
    }

    async fn failed(&self, attempt: u64, error: &GateError) {
        self.emit(GateEvent::Failed {
            gate: self.gate.clone(),
            attempt,
            reason: error.to_string(),
            at: Utc::now(),
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tower::service_fn;

    #[tokio::test]
    async fn callbacks_route_by_outcome() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (ok, err) = (seen.clone(), seen.clone());
        let cb = Callbacks::new(
            move |attempt, grant: &String| ok.lock().unwrap().push(format!("{attempt}:{grant}")),
            move |attempt, e| err.lock().unwrap().push(format!("{attempt}:{e}")),
        );

        cb.authorized(1, &"granted".to_string()).await;
        Notify::<String>::failed(&cb, 2, &GateError::failed(2, "denied".into())).await;

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen[0], "1:granted");
        assert_eq!(seen[1], "2:authorization attempt 2 failed: denied");
    }

    #[tokio::test]
    async fn event_sink_forwards_to_collector() {
        let sink = Arc::new(tokio::sync::Mutex::new(Vec::<GateEvent>::new()));
        let sink_cl = sink.clone();
        let collector = service_fn(move |ev: GateEvent| {
            let sink = sink_cl.clone();
            async move {
                sink.lock().await.push(ev);
                Ok::<(), BoxError>(())
            }
        });
        let events = EventSink::new("camera", collector);

        Notify::<()>::authorized(&events, 1, &()).await;
        Notify::<()>::failed(&events, 2, &GateError::failed(2, "nope".into())).await;

        let data = sink.lock().await.clone();
        assert_eq!(data.len(), 2);
        assert!(data[0].is_authorized());
        match &data[1] {
            GateEvent::Failed { gate, attempt, reason, .. } => {
                assert_eq!(gate, "camera");
                assert_eq!(*attempt, 2);
                assert!(reason.contains("nope"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn collector_errors_are_swallowed() {
        let collector =
            service_fn(|_ev: GateEvent| async move { Err::<(), BoxError>("sink down".into()) });
        let events = EventSink::new("camera", collector);
        Notify::<()>::authorized(&events, 1, &()).await;
    }

    #[test]
    fn event_serializes_with_outcome_tag() {
        let ev = GateEvent::Authorized {
            gate: "g".into(),
            attempt: 4,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["outcome"], "authorized");
        assert_eq!(json["attempt"], 4);
    }
}
