use std::{future::Future, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use crate::config::AppConfig;

/// Failures reported by the identity and expense stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No row matched; for expenses this also covers rows owned by someone else.
    #[error("record not found")]
    NotFound,

    #[error("email already registered")]
    DuplicateEmail,

    #[error("store operation `{0}` timed out")]
    Timeout(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(config.db_timeout())
        .connect(&config.database_url)
        .await
        .context("connect to database")?;

    bounded(config.db_timeout(), "ping", sqlx::query("SELECT 1").execute(&db))
        .await
        .context("ping database")?;

    info!(max_connections = config.db_max_connections, "database pool ready");
    Ok(db)
}

/// Runs one store operation under `budget`.
///
/// On timeout the query future is dropped, which cancels it and hands the
/// connection back to the pool.
pub async fn bounded<T, F>(budget: Duration, op: &'static str, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(res) => res.map_err(StoreError::from),
        Err(_) => {
            warn!(op, budget_ms = budget.as_millis() as u64, "store operation timed out");
            Err(StoreError::Timeout(op))
        }
    }
}
