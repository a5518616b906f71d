//! Dual-Order Performance Repository
//!
//! Data access layer for market/limit leg records. Records are append-only
//! facts: there is deliberately no update statement for this table.

use chrono::{NaiveDate, Utc};
use tracing::{debug, error};

use super::models::RegisterPerformance;
use super::{day_bounds, range_bounds, DbPool};
use crate::domain::entities::performance::PerformanceRecord;
use crate::domain::errors::LedgerError;

/// Performance record repository
pub struct PerformanceRepository {
    pool: DbPool,
}

impl PerformanceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Register one leg of a dual order.
    ///
    /// # Errors
    /// - `InvalidData` for an empty symbol, non-positive lot size, or a
    ///   bot id outside the bounded pool
    /// - `DuplicateKey` when the magic number was already registered
    pub async fn register(
        &self,
        input: RegisterPerformance,
    ) -> Result<PerformanceRecord, LedgerError> {
        input.validate()?;

        let now = Utc::now();
        let open_time = input.open_time.unwrap_or(now);

        let record = sqlx::query_as::<_, PerformanceRecord>(
            r#"
            INSERT INTO dual_performance (
                magic_number, bot_id, symbol, order_type, direction,
                entry_price, exit_price, lot_size, profit_loss, is_winner,
                activation_status, open_time, close_time, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            RETURNING *
            "#,
        )
        .bind(input.magic_number)
        .bind(input.bot_id)
        .bind(&input.symbol)
        .bind(input.order_type.as_str())
        .bind(input.direction.as_str())
        .bind(input.entry_price)
        .bind(input.exit_price)
        .bind(input.lot_size)
        .bind(input.profit_loss)
        .bind(input.is_winner)
        .bind(input.activation_status.as_str())
        .bind(open_time)
        .bind(input.close_time)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Failed to register performance record magic={}: {}",
                input.magic_number, e
            );
            LedgerError::from_insert(e, &format!("magic_number={}", input.magic_number))
        })?;

        debug!(
            "Registered performance record: magic={} {} {}",
            record.magic_number, record.symbol, record.order_type
        );
        Ok(record)
    }

    /// Get record by magic number
    pub async fn get_by_magic_number(
        &self,
        magic_number: i64,
    ) -> Result<Option<PerformanceRecord>, LedgerError> {
        let record = sqlx::query_as::<_, PerformanceRecord>(
            "SELECT * FROM dual_performance WHERE magic_number = ?1",
        )
        .bind(magic_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Failed to get performance record magic={}: {}",
                magic_number, e
            );
            LedgerError::Storage(e)
        })?;

        Ok(record)
    }

    /// All legs a bot opened on one UTC day.
    pub async fn list_for_day(
        &self,
        bot_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<PerformanceRecord>, LedgerError> {
        let (start, end) = day_bounds(date);
        let records = sqlx::query_as::<_, PerformanceRecord>(
            r#"
            SELECT * FROM dual_performance
            WHERE bot_id = ?1 AND open_time >= ?2 AND open_time < ?3
            ORDER BY open_time ASC
            "#,
        )
        .bind(bot_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Failed to list performance records for bot {} on {}: {}",
                bot_id, date, e
            );
            LedgerError::Storage(e)
        })?;

        Ok(records)
    }

    /// All legs opened in an inclusive date range, across bots.
    pub async fn list_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PerformanceRecord>, LedgerError> {
        let (start, end) = range_bounds(from, to);
        let records = sqlx::query_as::<_, PerformanceRecord>(
            r#"
            SELECT * FROM dual_performance
            WHERE open_time >= ?1 AND open_time < ?2
            ORDER BY open_time ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Failed to list performance records in {}..{}: {}",
                from, to, e
            );
            LedgerError::Storage(e)
        })?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::operation::{Direction, OrderType};
    use crate::domain::entities::performance::ActivationStatus;
    use crate::persistence::init_database;

    fn register_input(magic_number: i64, order_type: OrderType) -> RegisterPerformance {
        RegisterPerformance {
            magic_number,
            bot_id: 1,
            symbol: "EURUSD".to_string(),
            order_type,
            direction: Direction::Buy,
            entry_price: 1.1000,
            exit_price: None,
            lot_size: 0.1,
            profit_loss: 0.0,
            is_winner: false,
            activation_status: ActivationStatus::Pending,
            open_time: None,
            close_time: None,
        }
    }

    async fn repo() -> PerformanceRepository {
        let pool = init_database("sqlite::memory:").await.unwrap();
        PerformanceRepository::new(pool)
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let repo = repo().await;

        let created = repo
            .register(register_input(1, OrderType::Market))
            .await
            .unwrap();
        assert_eq!(created.order_type, "market");
        assert_eq!(created.activation_status, "pending");

        let fetched = repo.get_by_magic_number(1).await.unwrap().unwrap();
        assert_eq!(fetched.id, created.id);

        assert!(repo.get_by_magic_number(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates() {
        let repo = repo().await;
        repo.register(register_input(1, OrderType::Market))
            .await
            .unwrap();

        let err = repo
            .register(register_input(1, OrderType::Limit))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let repo = repo().await;

        let mut bad_bot = register_input(1, OrderType::Market);
        bad_bot.bot_id = 7;
        assert!(matches!(
            repo.register(bad_bot).await.unwrap_err(),
            LedgerError::InvalidData(_)
        ));

        let mut bad_lot = register_input(2, OrderType::Market);
        bad_lot.lot_size = -0.1;
        assert!(repo.register(bad_lot).await.is_err());
    }

    #[tokio::test]
    async fn test_list_for_day_scopes_bot_and_date() {
        let repo = repo().await;
        let today = Utc::now().date_naive();

        repo.register(register_input(1, OrderType::Market))
            .await
            .unwrap();
        repo.register(register_input(2, OrderType::Limit))
            .await
            .unwrap();

        let mut other_bot = register_input(3, OrderType::Market);
        other_bot.bot_id = 2;
        repo.register(other_bot).await.unwrap();

        let mut yesterday_leg = register_input(4, OrderType::Market);
        yesterday_leg.open_time = Some(Utc::now() - chrono::Duration::days(1));
        repo.register(yesterday_leg).await.unwrap();

        let todays = repo.list_for_day(1, today).await.unwrap();
        assert_eq!(todays.len(), 2);

        let range = repo
            .list_in_range(today - chrono::Duration::days(1), today)
            .await
            .unwrap();
        assert_eq!(range.len(), 4);
    }
}
