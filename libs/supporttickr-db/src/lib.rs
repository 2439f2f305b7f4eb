pub mod models;
pub mod store;

pub use sqlx;
pub use store::{EntityStore, StoreError, StoreResult, TicketFilter};

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;

pub async fn connect_postgres(url: &str) -> Result<sqlx::PgPool> {
    if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
        return Err(anyhow::anyhow!(
            "DATABASE_URL must start with postgres:// or postgresql://"
        ));
    }

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run DB migrations")?;

    Ok(pool)
}

pub async fn connect_redis(url: &str) -> Result<redis::aio::ConnectionManager> {
    let client = redis::Client::open(url).context("Invalid REDIS_URL")?;
    let manager = client
        .get_connection_manager()
        .await
        .context("Failed to connect to Redis")?;
    Ok(manager)
}
