//! # Guarded Service
//!
//! An upload service that must hold a session token. The token is fetched by
//! a login service wrapped in `AuthorizationGateLayer`; the upload service is
//! wrapped in `RequireAuthorizationLayer` so every request first acquires the
//! token from the gate.
//!
//! ```bash
//! cargo run --example guarded_service
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tower::{service_fn, ServiceBuilder};
use tower_authgate::{
    authorize_fn, config, AuthorizationGate, Authorized, BoxError, RequireAuthorizationLayer,
    ServiceExt,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_target(false)
        .compact()
        .init();

    let logins = Arc::new(AtomicUsize::new(0));
    let counter = logins.clone();
    let login = authorize_fn(move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if n == 0 {
                Err::<String, BoxError>("identity provider unavailable".into())
            } else {
                Ok(format!("session-{n}"))
            }
        }
    });
    let gate = AuthorizationGate::with_config(login, config::from_env());

    let upload = service_fn(|req: Authorized<String, &'static str>| async move {
        Ok::<_, BoxError>(format!("uploaded {} with {}", req.request, req.grant))
    });
    let svc = ServiceBuilder::new()
        .layer(RequireAuthorizationLayer::new(gate.clone()))
        .service(upload);

    for file in ["a.png", "b.png", "c.png"] {
        match svc.clone().oneshot(file).await {
            Ok(msg) => println!("{msg}"),
            Err(e) => println!("{file}: {e}"),
        }
    }

    println!("logins performed: {}", logins.load(Ordering::SeqCst));
    println!("gate: {:?}", gate);
    Ok(())
}
