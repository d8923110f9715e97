//! Config - 接続設定
//!
//! ```toml
//! driver = "postgres"
//! url = "postgres://localhost/egress"
//! ```
//!
//! driver 名で実装を選び、接続後にスキーマを作成します。

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::domain::StoreError;
use crate::impls::{POSTGRES_DRIVER, PgDatabase, SQLITE_DRIVER, SqliteDatabase};
use crate::ports::Database;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_driver")]
    pub driver: String,
    #[serde(default = "default_url")]
    pub url: String,
}

fn default_driver() -> String {
    SQLITE_DRIVER.to_string()
}

fn default_url() -> String {
    "sqlite::memory:".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            url: default_url(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config read error: {0}")]
    Read(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(String),
}

impl DatabaseConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        toml::from_str(input).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_toml_str(&input)
    }
}

/// driver に応じて接続し、スキーマを作成する
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn Database>, StoreError> {
    let database: Arc<dyn Database> = match config.driver.as_str() {
        SQLITE_DRIVER => {
            let db = SqliteDatabase::connect(&config.url).await?;
            db.ensure_schema().await?;
            Arc::new(db)
        }
        POSTGRES_DRIVER => {
            let db = PgDatabase::connect(&config.url).await?;
            db.ensure_schema().await?;
            Arc::new(db)
        }
        other => return Err(StoreError::UnknownDriver(other.to_string())),
    };
    info!(driver = %config.driver, "database ready");
    Ok(database)
}
