//! # Authorize Once
//!
//! A permission prompt that the "user" declines twice and accepts on the
//! third try. Repeated triggers while the prompt is open share it, and after
//! acceptance every trigger is answered from cache.
//!
//! ```bash
//! cargo run --example authorize_once
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tower_authgate::{authorize_fn, AuthorizationGate, BoxError, Callbacks, ConfigBuilder};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .compact()
        .init();

    let prompts = Arc::new(AtomicUsize::new(0));
    let counter = prompts.clone();
    let ask_user = authorize_fn(move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if n < 2 {
                Err::<String, BoxError>("user declined".into())
            } else {
                Ok("camera access".to_string())
            }
        }
    });

    let config = ConfigBuilder::new()
        .name("camera")
        .attempt_timeout(Duration::from_secs(5))
        .build();
    let gate = AuthorizationGate::builder(ask_user)
        .config(config)
        .notify(Callbacks::new(
            |attempt, grant: &String| println!("  granted on attempt {attempt}: {grant}"),
            |attempt, error| println!("  attempt {attempt} failed: {error}"),
        ))
        .build();

    for press in 1..=4 {
        println!("button press {press} (three rapid taps)");
        let taps = join_all((0..3).map(|_| gate.acquire())).await;
        let ok = taps.iter().filter(|t| t.is_ok()).count();
        println!("  {ok}/3 taps authorized, status {:?}", gate.status());
    }

    println!("prompts shown: {}", prompts.load(Ordering::SeqCst));
    println!("stats: {:?}", gate.stats());
    Ok(())
}
