//! HTTP server facade with Axum, error handling, auth, and OpenAPI support.

use anyhow::Context;
use axum::Router;
use shelf_authz::TokenVerifier;
use shelf_db::PgPool;
use shelf_kernel::{settings::Settings, ModuleRegistry};
use shelf_telemetry::Instrumentation;

pub mod error;
pub mod middleware;
pub mod router;

pub use error::{AppError, ErrorBody};
use router::RouterBuilder;

/// Everything the router needs besides the module registry.
#[derive(Clone)]
pub struct ServerDeps {
    pub pool: PgPool,
    pub instrumentation: Instrumentation,
    pub verifier: TokenVerifier,
}

/// Start the HTTP server and serve until Ctrl-C or SIGTERM.
///
/// Returns once in-flight requests have completed.
pub async fn start_server(
    registry: &ModuleRegistry,
    settings: &Settings,
    deps: ServerDeps,
) -> anyhow::Result<()> {
    let address = settings.server.bind_address();
    tracing::info!("starting HTTP server on {}", address);

    let app = build_router(registry, settings, deps).context("failed to build HTTP router")?;

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind to address {}", address))?;

    tracing::info!("HTTP server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("HTTP server stopped accepting connections");
    Ok(())
}

/// Build the main HTTP router with all module routes mounted
pub fn build_router(
    registry: &ModuleRegistry,
    settings: &Settings,
    deps: ServerDeps,
) -> anyhow::Result<Router> {
    let mut router_builder = RouterBuilder::new()
        .with_health(deps.pool, &settings.telemetry.service_name)
        .with_auth(deps.verifier);

    for module in registry.modules() {
        let module_name = module.name();
        tracing::info!(
            module = module_name,
            "mounting module routes under /{}",
            module_name
        );
        router_builder = router_builder.mount_module(module_name, module.routes());
    }

    let router = router_builder
        .with_openapi(registry)
        .with_fallback()
        .with_timeout(settings.server.request_timeout_ms)
        .with_request_id()
        .with_cors(&settings.server.cors_origin)?
        .with_tracing()
        .with_trace_context(deps.instrumentation)
        .build();

    Ok(router)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
