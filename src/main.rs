use std::net::SocketAddr;
use std::sync::Arc;

use dotenvy::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use swypeup::config::AppConfig;
use swypeup::database;
use swypeup::services::user_directory::SqliteUserDirectory;
use swypeup::services::Collaborators;
use swypeup::web::{build_router, AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Laad .env bestand
    dotenv().ok();

    // 1. Start logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let config = AppConfig::from_env()?;

    // 2. Verbind met de Database en draai migraties
    info!(database_url = %config.database_url, "Verbinden met database");
    let pool = database::connect(&config).await?;
    database::migrate(&pool).await?;

    // 3. Externe koppelingen (chat, gebruikers)
    let collaborators = Collaborators::new(
        Collaborators::chat_from_config(&config),
        Arc::new(SqliteUserDirectory::new(pool.clone())),
        config.chat_timeout,
    );

    // 4. Bouw de hele applicatie
    let app = build_router(AppState::new(pool, collaborators), &config.frontend_url);

    // 5. Start de server (met fallback poort)
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            let fallback: SocketAddr =
                format!("{}:{}", config.host, config.port.saturating_add(1)).parse()?;
            warn!("Kon niet binden op {}: {}. Probeer fallback {}", addr, e, fallback);
            tokio::net::TcpListener::bind(fallback).await?
        }
    };

    info!("Server draait op http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
