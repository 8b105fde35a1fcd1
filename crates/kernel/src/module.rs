use async_trait::async_trait;
use axum::Router;
use shelf_db::PgPool;
use shelf_telemetry::Instrumentation;

/// Shared resources handed to modules during initialization.
pub struct InitCtx<'a> {
    pub settings: &'a crate::settings::Settings,
    pub db: &'a PgPool,
    pub instrumentation: &'a Instrumentation,
}

/// Unit of functionality mounted into the server.
#[async_trait]
pub trait Module: Sync + Send {
    /// Unique name for this module
    fn name(&self) -> &'static str;

    /// Initialize the module with the provided context
    /// Called during application startup before routes are collected
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Return the Axum router for this module's routes
    /// Routes will be mounted under `/{module_name}`
    fn routes(&self) -> Router {
        Router::new()
    }

    /// OpenAPI fragment (`paths` relative to the mount point, `components`)
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    /// Release module resources
    /// Called during application shutdown
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
