//! End-to-end behavior of the authorization gate through its public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tower_authgate::{
    authorize_fn, AuthorizationGate, Authorize, BoxError, Callbacks, GateError, GateStatus,
};

/// Authorizer whose outcomes are read from a script; `true` grants.
fn scripted(script: Vec<bool>) -> (impl Authorize<Grant = usize>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let script = Arc::new(script);
    let auth = authorize_fn(move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        let grant = script.get(n).copied().unwrap_or(false);
        async move {
            tokio::task::yield_now().await;
            if grant {
                Ok::<_, BoxError>(n)
            } else {
                Err(format!("attempt {n} rejected").into())
            }
        }
    });
    (auth, calls)
}

#[tokio::test]
async fn fails_twice_then_succeeds_then_replays() {
    let (auth, calls) = scripted(vec![false, false, true]);
    let gate = AuthorizationGate::new(auth);

    let first = gate.acquire().await.unwrap_err();
    assert!(matches!(first, GateError::Failed { attempt: 1, .. }));
    let second = gate.acquire().await.unwrap_err();
    assert!(matches!(second, GateError::Failed { attempt: 2, .. }));
    assert_eq!(gate.acquire().await.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    // fourth call: no invocation, immediate success
    let fourth = gate.acquire();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(fourth.await.unwrap(), 2);
    assert_eq!(gate.status(), GateStatus::Authorized { attempt: 3 });
}

#[tokio::test]
async fn always_failing_operation_is_invoked_every_time() {
    let (auth, calls) = scripted(vec![]);
    let gate = AuthorizationGate::new(auth);

    for i in 1..=5u64 {
        let err = gate.acquire().await.unwrap_err();
        assert_eq!(err.attempt(), Some(i));
        assert_eq!(calls.load(Ordering::SeqCst), i as usize);
    }
    assert_eq!(gate.status(), GateStatus::Idle);
    assert_eq!(gate.stats().failures, 5);
}

#[tokio::test]
async fn callers_of_a_round_see_the_same_outcome() {
    let (auth, calls) = scripted(vec![false, true]);
    let gate = AuthorizationGate::new(auth);

    let failed = join_all((0..4).map(|_| gate.acquire())).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(failed
        .iter()
        .all(|r| matches!(r, Err(GateError::Failed { attempt: 1, .. }))));

    let granted = join_all((0..4).map(|_| gate.acquire())).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(granted.iter().all(|r| matches!(r, Ok(1))));
}

#[tokio::test]
async fn callers_across_tasks_share_the_round() {
    let (auth, calls) = scripted(vec![true]);
    let gate = AuthorizationGate::new(auth);

    let handles: Vec<_> = (0..8).map(|_| tokio::spawn(gate.acquire())).collect();
    for h in handles {
        assert_eq!(h.await.unwrap().unwrap(), 0);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let stats = gate.stats();
    assert_eq!(stats.attempts, 1);
    assert_eq!(stats.joined, 7);
}

#[tokio::test]
async fn notifier_sees_each_round_once() {
    let (auth, _calls) = scripted(vec![false, true]);
    let log = Arc::new(Mutex::new(Vec::new()));
    let (ok, err) = (log.clone(), log.clone());
    let gate = AuthorizationGate::builder(auth)
        .name("microphone")
        .notify(Callbacks::new(
            move |attempt, grant: &usize| ok.lock().unwrap().push(format!("ok {attempt} {grant}")),
            move |attempt, _| err.lock().unwrap().push(format!("err {attempt}")),
        ))
        .build();

    join_all((0..3).map(|_| gate.acquire())).await;
    join_all((0..3).map(|_| gate.acquire())).await;
    gate.acquire().await.unwrap();

    let log = log.lock().unwrap().clone();
    assert_eq!(log, vec!["err 1".to_string(), "ok 2 1".to_string()]);
}
