use std::sync::Arc;

use fintrack::app::{build_app, serve};
use fintrack::config::AppConfig;
use fintrack::state::AppState;
use fintrack::store::{postgres, PgStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "fintrack=debug,axum=info,tower_http=info".to_string());
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

    let config = Arc::new(AppConfig::from_env()?);
    let pool = postgres::connect(&config).await?;

    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
        tracing::warn!(error = %e, "migration failed; continuing");
    }

    let state = AppState::new(config, Arc::new(PgStore::new(pool)));
    let app = build_app(state);
    serve(app).await
}
