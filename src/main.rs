use std::net::SocketAddr;

use anyhow::Context;

mod app;
mod auth;
mod config;
mod db;
mod error;
mod expenses;
mod extract;
mod state;
#[cfg(test)]
mod testing;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "expense_tracker=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env().context("loading configuration")?;
    let state = AppState::init(config).await?;

    let addr: SocketAddr = format!("{}:{}", state.config.host, state.config.port)
        .parse()
        .context("parsing HOST/PORT")?;
    let grace = state.config.shutdown_grace();

    sqlx::migrate!("./migrations")
        .run(&state.db)
        .await
        .context("running database migrations")?;
    tracing::info!("migrations applied");

    let db = state.db.clone();
    let router = app::build_app(state);

    app::serve(router, addr, app::shutdown_signal(), grace).await?;

    db.close().await;
    tracing::info!("database pool closed");
    Ok(())
}
