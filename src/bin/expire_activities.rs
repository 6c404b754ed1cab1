use chrono::Utc;
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

use swypeup::config::AppConfig;
use swypeup::database;
use swypeup::services::expiry_service;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("expire activities: {}", e);
            std::process::exit(1);
        }
    };

    let pool = match database::connect(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("expire activities: cannot connect to database: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = database::migrate(&pool).await {
        eprintln!("expire activities: migration failed: {}", e);
        std::process::exit(1);
    }

    match expiry_service::expire_finished(&pool, Utc::now()).await {
        Ok(report) => {
            println!("expire activities: expired={}", report.expired);
        }
        Err(e) => {
            eprintln!("expire activities failed: {}", e);
            std::process::exit(1);
        }
    }
}
