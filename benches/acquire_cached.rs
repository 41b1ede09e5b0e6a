use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use futures::future::join_all;
use tokio::runtime::Runtime;
use tower_authgate::{authorize_fn, AuthorizationGate, BoxError};

fn bench_acquire(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    // Cached path: the grant is replayed without touching the authorizer
    let gate = AuthorizationGate::new(authorize_fn(|| async {
        Ok::<_, BoxError>("token".to_string())
    }));
    rt.block_on(gate.acquire()).unwrap();
    c.bench_function("acquire_cached", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = gate.acquire().await.unwrap();
        })
    });

    // Cold path: a fresh gate per iteration, 16 callers sharing one round
    c.bench_function("acquire_cold_16_callers", |b| {
        b.to_async(&rt).iter_batched(
            || {
                AuthorizationGate::new(authorize_fn(|| async {
                    tokio::task::yield_now().await;
                    Ok::<_, BoxError>(1u64)
                }))
            },
            |gate| async move {
                let out = join_all((0..16).map(|_| gate.acquire())).await;
                assert!(out.iter().all(|r| r.is_ok()));
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_acquire);
criterion_main!(benches);
