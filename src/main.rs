// src/main.rs

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stayease_api::{config::Config, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("stayease_api=info,tower_http=info")),
        )
        .init();

    let cfg = Config::from_env()?;
    tokio::fs::create_dir_all(&cfg.media_root).await?;

    let pool = db::connect(&cfg.database_url).await?;
    if let (Some(email), Some(password)) = (&cfg.admin_email, &cfg.admin_password) {
        db::accounts::ensure_admin(&pool, email, password).await?;
    }

    let state = AppState::new(pool, &cfg);
    let app = stayease_api::app(state);

    let addr = format!("0.0.0.0:{}", cfg.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("API listening on http://{addr}");

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
