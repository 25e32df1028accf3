//! Connection pool construction, shared by the registry and vector store.
//!
//! Pool is configured with max size, acquisition timeout, and idle-recycle
//! interval; pragmas (WAL mode, foreign keys, busy timeout) are set on each
//! new connection as it's created.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub wal_mode: bool,
    pub foreign_keys: bool,
    pub busy_timeout_secs: u32,
    /// Embedding dimension this database's vector column must match. Pool
    /// construction fails loudly on disagreement.
    pub embedding_dimension: usize,
}

impl PoolConfig {
    pub fn from_env(embedding_dimension: usize) -> Result<Self, StoreError> {
        let url = std::env::var("TOOLGATE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite::memory:".to_string());
        let max_connections = parse_env_u32("TOOLGATE_DB_MAX_CONNECTIONS", 10)?;
        let acquire_timeout_secs = parse_env_u64("TOOLGATE_DB_ACQUIRE_TIMEOUT_SECS", 10)?;
        let idle_timeout_secs = parse_env_u64("TOOLGATE_DB_IDLE_TIMEOUT_SECS", 600)?;

        Ok(Self {
            url,
            max_connections,
            acquire_timeout: Duration::from_secs(acquire_timeout_secs),
            idle_timeout: Some(Duration::from_secs(idle_timeout_secs)),
            wal_mode: true,
            foreign_keys: true,
            busy_timeout_secs: 30,
            embedding_dimension,
        })
    }

    pub fn memory(embedding_dimension: usize) -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: None,
            wal_mode: false,
            foreign_keys: true,
            busy_timeout_secs: 5,
            embedding_dimension,
        }
    }
}

fn parse_env_u32(key: &str, default: u32) -> Result<u32, StoreError> {
    match std::env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| StoreError::Config(format!("{key} must be a positive integer"))),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(key: &str, default: u64) -> Result<u64, StoreError> {
    match std::env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| StoreError::Config(format!("{key} must be a positive integer"))),
        Err(_) => Ok(default),
    }
}

/// Connects, applies pragmas, runs embedded migrations, and verifies the
/// configured embedding dimension against the `registry_config` row that
/// migrations seed on first run.
pub async fn connect(config: &PoolConfig) -> Result<SqlitePool, StoreError> {
    let mut options = SqliteConnectOptions::from_str(&config.url)?;
    if config.foreign_keys {
        options = options.pragma("foreign_keys", "ON");
    }
    options = options.pragma("busy_timeout", config.busy_timeout_secs.to_string());
    if config.wal_mode {
        options = options.pragma("journal_mode", "WAL");
    }

    let mut pool_options = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout);
    if let Some(idle) = config.idle_timeout {
        pool_options = pool_options.idle_timeout(idle);
    }

    let pool = pool_options.connect_with(options).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    enforce_embedding_dimension(&pool, config.embedding_dimension).await?;

    info!(url = %config.url, dimension = config.embedding_dimension, "toolgate-persist connected");
    Ok(pool)
}

async fn enforce_embedding_dimension(pool: &SqlitePool, dimension: usize) -> Result<(), StoreError> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT embedding_dimension FROM registry_config WHERE id = 1")
            .fetch_optional(pool)
            .await?;

    match row {
        Some((stored,)) if stored as usize != dimension => Err(StoreError::DimensionMismatch {
            expected: stored as usize,
            got: dimension,
        }),
        Some(_) => Ok(()),
        None => {
            sqlx::query("INSERT INTO registry_config (id, embedding_dimension) VALUES (1, ?)")
                .bind(dimension as i64)
                .execute(pool)
                .await?;
            Ok(())
        }
    }
}
