//! Daily Metrics Repository
//!
//! Data access layer for consolidated (bot, day) rows. All writes are
//! upserts keyed on the store's UNIQUE(bot_id, date) constraint, so
//! re-consolidating a day overwrites in place instead of duplicating and
//! two racing consolidators cannot both insert.

use chrono::{NaiveDate, Utc};
use tracing::{debug, error};

use super::models::UpsertDailyMetrics;
use super::DbPool;
use crate::domain::entities::daily_metrics::DailyMetricsRecord;
use crate::domain::errors::LedgerError;

/// Daily metrics repository
pub struct DailyMetricsRepository {
    pool: DbPool,
}

impl DailyMetricsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert or overwrite the row for (bot_id, date).
    pub async fn upsert(
        &self,
        input: UpsertDailyMetrics,
    ) -> Result<DailyMetricsRecord, LedgerError> {
        let now = Utc::now();
        let record = sqlx::query_as::<_, DailyMetricsRecord>(
            r#"
            INSERT INTO daily_metrics (
                bot_id, date, total_operations, winning_operations, losing_operations,
                profit_loss_total, profit_loss_market, profit_loss_limit,
                total_queries, total_tokens, total_ia_cost, winrate, profit_factor,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)
            ON CONFLICT(bot_id, date) DO UPDATE SET
                total_operations = excluded.total_operations,
                winning_operations = excluded.winning_operations,
                losing_operations = excluded.losing_operations,
                profit_loss_total = excluded.profit_loss_total,
                profit_loss_market = excluded.profit_loss_market,
                profit_loss_limit = excluded.profit_loss_limit,
                total_queries = excluded.total_queries,
                total_tokens = excluded.total_tokens,
                total_ia_cost = excluded.total_ia_cost,
                winrate = excluded.winrate,
                profit_factor = excluded.profit_factor,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(input.bot_id)
        .bind(input.date)
        .bind(input.total_operations)
        .bind(input.winning_operations)
        .bind(input.losing_operations)
        .bind(input.profit_loss_total)
        .bind(input.profit_loss_market)
        .bind(input.profit_loss_limit)
        .bind(input.total_queries)
        .bind(input.total_tokens)
        .bind(input.total_ia_cost)
        .bind(input.winrate)
        .bind(input.profit_factor)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Failed to upsert daily metrics for bot {} on {}: {}",
                input.bot_id, input.date, e
            );
            LedgerError::Storage(e)
        })?;

        debug!(
            "Upserted daily metrics: bot={} date={} operations={}",
            record.bot_id, record.date, record.total_operations
        );
        Ok(record)
    }

    /// Get the row for (bot_id, date)
    pub async fn get(
        &self,
        bot_id: i64,
        date: NaiveDate,
    ) -> Result<Option<DailyMetricsRecord>, LedgerError> {
        let record = sqlx::query_as::<_, DailyMetricsRecord>(
            "SELECT * FROM daily_metrics WHERE bot_id = ?1 AND date = ?2",
        )
        .bind(bot_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Failed to get daily metrics for bot {} on {}: {}",
                bot_id, date, e
            );
            LedgerError::Storage(e)
        })?;

        Ok(record)
    }

    /// One bot's rows over an inclusive date range, oldest first.
    pub async fn list_for_bot(
        &self,
        bot_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyMetricsRecord>, LedgerError> {
        let records = sqlx::query_as::<_, DailyMetricsRecord>(
            r#"
            SELECT * FROM daily_metrics
            WHERE bot_id = ?1 AND date >= ?2 AND date <= ?3
            ORDER BY date ASC
            "#,
        )
        .bind(bot_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to list daily metrics for bot {}: {}", bot_id, e);
            LedgerError::Storage(e)
        })?;

        Ok(records)
    }

    /// All bots' rows over an inclusive date range.
    pub async fn list_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyMetricsRecord>, LedgerError> {
        let records = sqlx::query_as::<_, DailyMetricsRecord>(
            r#"
            SELECT * FROM daily_metrics
            WHERE date >= ?1 AND date <= ?2
            ORDER BY bot_id ASC, date ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to list daily metrics in {}..{}: {}", from, to, e);
            LedgerError::Storage(e)
        })?;

        Ok(records)
    }
}
