//! PostgreSQL connection pool factory.

use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

pub use sqlx::PgPool;

/// Database section of the layered settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "DatabaseSettings::default_host")]
    pub host: String,
    #[serde(default = "DatabaseSettings::default_port")]
    pub port: u16,
    #[serde(default = "DatabaseSettings::default_name")]
    pub name: String,
    #[serde(default = "DatabaseSettings::default_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "DatabaseSettings::default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "DatabaseSettings::default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    #[serde(default = "DatabaseSettings::default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl DatabaseSettings {
    fn default_host() -> String {
        "localhost".to_string()
    }

    fn default_port() -> u16 {
        5432
    }

    fn default_name() -> String {
        "expressdb".to_string()
    }

    fn default_user() -> String {
        "postgres".to_string()
    }

    fn default_max_connections() -> u32 {
        20
    }

    fn default_idle_timeout_ms() -> u64 {
        30_000
    }

    fn default_connect_timeout_ms() -> u64 {
        2_000
    }

    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.name)
            .username(&self.user)
            .password(&self.password)
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .idle_timeout(Duration::from_millis(self.idle_timeout_ms))
            .acquire_timeout(Duration::from_millis(self.connect_timeout_ms))
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            name: Self::default_name(),
            user: Self::default_user(),
            password: String::new(),
            max_connections: Self::default_max_connections(),
            idle_timeout_ms: Self::default_idle_timeout_ms(),
            connect_timeout_ms: Self::default_connect_timeout_ms(),
        }
    }
}

/// Build the shared pool.
///
/// Connections are opened lazily, so a database that is down at startup is
/// logged and surfaces later through the health route instead of aborting.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<PgPool> {
    tracing::info!(
        target: "shelf-db",
        host = %settings.host,
        port = settings.port,
        database = %settings.name,
        user = %settings.user,
        max_connections = settings.max_connections,
        "database configuration"
    );

    let pool = lazy_pool(settings);

    match ping(&pool).await {
        Ok(()) => tracing::info!(target: "shelf-db", "database connection successful"),
        Err(err) => tracing::error!(
            target: "shelf-db",
            error = %err,
            "error connecting to database"
        ),
    }

    Ok(pool)
}

/// Pool that opens its first connection on first use.
pub fn lazy_pool(settings: &DatabaseSettings) -> PgPool {
    settings
        .pool_options()
        .connect_lazy_with(settings.connect_options())
}

/// Round-trip a trivial statement through the pool.
pub async fn ping(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .context("database ping failed")?;
    Ok(())
}

/// Stop handing out connections and wait for in-flight queries to finish.
pub async fn close(pool: &PgPool) {
    tracing::info!(target: "shelf-db", "closing database pool");
    pool.close().await;
    tracing::info!(target: "shelf-db", "database pool closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_limits() {
        let settings = DatabaseSettings::default();
        assert_eq!(settings.max_connections, 20);
        assert_eq!(settings.idle_timeout_ms, 30_000);
        assert_eq!(settings.connect_timeout_ms, 2_000);
    }

    #[test]
    fn default_database_points_at_local_postgres() {
        let settings = DatabaseSettings::default();
        assert_eq!(settings.host, "localhost");
        assert_eq!(settings.port, 5432);
        assert_eq!(settings.name, "expressdb");
    }

    #[tokio::test]
    async fn ping_fails_when_database_is_unreachable() {
        let settings = DatabaseSettings {
            host: "127.0.0.1".to_string(),
            port: 1,
            connect_timeout_ms: 500,
            ..DatabaseSettings::default()
        };
        let pool = lazy_pool(&settings);

        let err = ping(&pool).await.unwrap_err();
        assert!(err.to_string().contains("database ping failed"));
    }

    #[test]
    fn password_is_optional_in_config() {
        let settings: DatabaseSettings =
            serde_json::from_value(serde_json::json!({ "host": "db" })).unwrap();
        assert_eq!(settings.host, "db");
        assert!(settings.password.is_empty());
    }
}
