//! Persistence Layer
//!
//! SQLite storage for the operation ledger, dual-order performance records,
//! and consolidated daily metrics, with async access via sqlx.
//!
//! Uniqueness is enforced by the store, not by read-then-write application
//! logic: `operations.magic_number` and `dual_performance.magic_number` are
//! UNIQUE, `daily_metrics` is UNIQUE on (bot_id, date), and daily-metrics
//! writes go through `INSERT ... ON CONFLICT DO UPDATE`. A create racing on
//! the same key fails one caller with `DuplicateKey`, never overwrites.
//!
//! # Database Schema
//!
//! ## Operations Table
//! - magic_number: caller-assigned, unique across all operations ever
//! - current stop_loss/take_profit plus the write-once `_initial` pair
//! - status: "pending", "open", "closed"
//! - profit_loss and close_time set together, once, by the close call
//!
//! ## Dual Performance Table
//! - one row per market/limit leg, unique on magic_number, append-only
//!
//! ## Daily Metrics Table
//! - one row per (bot_id, date), overwritten in place on re-consolidation

pub mod metrics_repository;
pub mod models;
pub mod operation_repository;
pub mod performance_repository;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::domain::errors::LedgerError;

/// Database connection pool
pub type DbPool = SqlitePool;

/// Initialize the database connection pool
///
/// # Arguments
/// - `database_url`: Path to SQLite database file (e.g., "sqlite://data/tradeledger.db")
///
/// # Errors
/// Returns `LedgerError::Storage` if the connection or migrations fail
pub async fn init_database(database_url: &str) -> Result<DbPool, LedgerError> {
    init_with_config(&DatabaseConfig {
        url: database_url.to_string(),
        ..Default::default()
    })
    .await
}

/// Initialize the database connection pool from a [`DatabaseConfig`]
pub async fn init_with_config(config: &DatabaseConfig) -> Result<DbPool, LedgerError> {
    info!("Initializing database: {}", config.url);

    // Ensure data directory exists
    if let Some(db_path) = config.url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LedgerError::Storage(sqlx::Error::Configuration(Box::new(e))))?;
        }
    }

    let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    info!("Database initialized successfully");

    Ok(pool)
}

/// Run database migrations
async fn run_migrations(pool: &DbPool) -> Result<(), LedgerError> {
    info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS operations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            magic_number INTEGER NOT NULL UNIQUE,
            bot_id INTEGER NOT NULL,
            ia_id INTEGER NOT NULL,
            symbol TEXT NOT NULL,
            order_type TEXT NOT NULL CHECK(order_type IN ('market', 'limit')),
            direction TEXT NOT NULL CHECK(direction IN ('buy', 'sell')),
            suggested_price REAL NOT NULL,
            actual_entry_price REAL,
            stop_loss REAL NOT NULL,
            take_profit REAL NOT NULL,
            stop_loss_initial REAL NOT NULL,
            take_profit_initial REAL NOT NULL,
            lot_size REAL NOT NULL,
            risk_percentage REAL NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('pending', 'open', 'closed')),
            profit_loss REAL,
            open_time DATETIME NOT NULL,
            close_time DATETIME,
            conversation_id TEXT,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dual_performance (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            magic_number INTEGER NOT NULL UNIQUE,
            bot_id INTEGER NOT NULL,
            symbol TEXT NOT NULL,
            order_type TEXT NOT NULL CHECK(order_type IN ('market', 'limit')),
            direction TEXT NOT NULL CHECK(direction IN ('buy', 'sell')),
            entry_price REAL NOT NULL,
            exit_price REAL,
            lot_size REAL NOT NULL,
            profit_loss REAL NOT NULL DEFAULT 0.0,
            is_winner INTEGER NOT NULL DEFAULT 0,
            activation_status TEXT NOT NULL
                CHECK(activation_status IN ('activated', 'not_activated', 'pending')),
            open_time DATETIME NOT NULL,
            close_time DATETIME,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_metrics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bot_id INTEGER NOT NULL,
            date DATE NOT NULL,
            total_operations INTEGER NOT NULL DEFAULT 0,
            winning_operations INTEGER NOT NULL DEFAULT 0,
            losing_operations INTEGER NOT NULL DEFAULT 0,
            profit_loss_total REAL NOT NULL DEFAULT 0.0,
            profit_loss_market REAL NOT NULL DEFAULT 0.0,
            profit_loss_limit REAL NOT NULL DEFAULT 0.0,
            total_queries INTEGER NOT NULL DEFAULT 0,
            total_tokens INTEGER NOT NULL DEFAULT 0,
            total_ia_cost REAL NOT NULL DEFAULT 0.0,
            winrate REAL NOT NULL DEFAULT 0.0,
            profit_factor REAL NOT NULL DEFAULT 0.0,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(bot_id, date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Indexes for the common read patterns
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_operations_status ON operations(status)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_operations_symbol ON operations(symbol)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_operations_bot_close ON operations(bot_id, close_time)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_dual_performance_bot_open ON dual_performance(bot_id, open_time)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_dual_performance_symbol ON dual_performance(symbol)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_daily_metrics_bot ON daily_metrics(bot_id)")
        .execute(pool)
        .await?;

    info!("Database migrations completed successfully");

    Ok(())
}

/// UTC day window for `date`: [00:00:00, next midnight).
pub(crate) fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    (start, start + chrono::Duration::days(1))
}

/// Inclusive date range as a half-open timestamp window.
pub(crate) fn range_bounds(from: NaiveDate, to: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    (day_bounds(from).0, day_bounds(to).1)
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://data/tradeledger.db")
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/tradeledger.db".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    /// Load from environment variables, honoring a local `.env` file.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://data/tradeledger.db".to_string());

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Self {
            url,
            max_connections,
        }
    }
}
