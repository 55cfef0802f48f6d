#![allow(dead_code)]

use anyhow::{Context, Result};
use uuid::Uuid;

use yalp_api::config::{AppConfig, DatabaseConfig};
use yalp_api::database::DatabaseManager;

/// Connects to `DATABASE_URL` and applies migrations. `None` when the
/// variable is unset so Postgres-backed tests skip on machines without one.
pub async fn database() -> Result<Option<DatabaseManager>> {
    let _ = dotenvy::dotenv();
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return Ok(None);
    };

    let config = DatabaseConfig { url: Some(url), max_connections: 4, ..AppConfig::development().database };
    let db = DatabaseManager::connect(&config).await.context("failed to connect to test database")?;
    db.migrate().await.context("failed to migrate test database")?;
    Ok(Some(db))
}

/// Unique per call so parallel tests never collide on the email index.
pub fn unique_email(prefix: &str) -> String {
    format!("{}-{}@test.example.com", prefix, Uuid::new_v4().simple())
}
