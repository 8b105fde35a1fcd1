use anyhow::Context;
use shelf_authz::TokenVerifier;
use shelf_http::ServerDeps;
use shelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};
use shelf_telemetry::Instrumentation;

fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load shelf settings")?;

    // Telemetry first: the OTLP exporters build blocking HTTP clients, which
    // must happen outside the async runtime.
    let telemetry = shelf_telemetry::init(&settings.telemetry, settings.environment.as_str())
        .context("failed to initialize telemetry")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let result = runtime.block_on(run(settings));
    drop(runtime);

    telemetry.shutdown();
    result
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    tracing::info!(
        env = ?settings.environment,
        db_host = %settings.database.host,
        db_name = %settings.database.name,
        "shelf-app bootstrap starting"
    );

    let pool = shelf_db::connect(&settings.database)
        .await
        .context("failed to create database pool")?;
    let instrumentation = Instrumentation::global();
    let verifier = TokenVerifier::from_settings(&settings.auth)
        .context("failed to configure token verifier")?;

    let mut registry = ModuleRegistry::new();
    shelf_app::register_all(&mut registry);

    let ctx = InitCtx {
        settings: &settings,
        db: &pool,
        instrumentation: &instrumentation,
    };
    registry.init_all(&ctx).await?;

    tracing::info!(modules = registry.len(), "shelf-app bootstrap complete");

    let served = shelf_http::start_server(
        &registry,
        &settings,
        ServerDeps {
            pool: pool.clone(),
            instrumentation,
            verifier,
        },
    )
    .await;

    if let Err(err) = registry.stop_all().await {
        tracing::warn!(error = %err, "module shutdown reported an error");
    }
    shelf_db::close(&pool).await;

    served
}
