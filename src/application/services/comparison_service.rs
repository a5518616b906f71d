//! Dual-Order Comparison Service
//!
//! Public surface of the comparator: register legs, compare the two legs
//! of one dual order, aggregate a bot's day, and group arbitrary ranges.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::domain::entities::performance::PerformanceRecord;
use crate::domain::errors::LedgerError;
use crate::domain::services::dual_order::{
    daily_comparison, group_records, DailyPerformanceComparison, GroupBy, GroupStats,
    OperationPerformance,
};
use crate::persistence::models::RegisterPerformance;
use crate::persistence::performance_repository::PerformanceRepository;
use crate::persistence::DbPool;

pub struct ComparisonService {
    records: PerformanceRepository,
}

impl ComparisonService {
    pub fn new(pool: DbPool) -> Self {
        Self {
            records: PerformanceRepository::new(pool),
        }
    }

    /// Register one leg of a dual order. Records are append-only.
    pub async fn register(
        &self,
        input: RegisterPerformance,
    ) -> Result<PerformanceRecord, LedgerError> {
        self.records.register(input).await
    }

    /// Compare the market and limit legs of one dual order.
    ///
    /// # Errors
    /// - `NotFound` when either magic number has no record
    /// - `InvalidData` when the magic numbers point at legs of the wrong
    ///   order type
    pub async fn compare_operation(
        &self,
        market_magic: i64,
        limit_magic: i64,
    ) -> Result<OperationPerformance, LedgerError> {
        let market = self
            .records
            .get_by_magic_number(market_magic)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("performance record magic_number={}", market_magic))
            })?;
        let limit = self
            .records
            .get_by_magic_number(limit_magic)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("performance record magic_number={}", limit_magic))
            })?;

        if !market.is_market() {
            return Err(LedgerError::InvalidData(format!(
                "magic_number={} is not a market leg",
                market_magic
            )));
        }
        if limit.is_market() {
            return Err(LedgerError::InvalidData(format!(
                "magic_number={} is not a limit leg",
                limit_magic
            )));
        }

        Ok(OperationPerformance::from_legs(&market, &limit))
    }

    /// Aggregate one bot's legs opened on `date`, split by order type.
    pub async fn compare_daily(
        &self,
        bot_id: i64,
        date: NaiveDate,
    ) -> Result<DailyPerformanceComparison, LedgerError> {
        let records = self.records.list_for_day(bot_id, date).await?;
        Ok(daily_comparison(bot_id, date, &records))
    }

    /// Group all legs in the inclusive date range along one dimension.
    pub async fn aggregated_metrics(
        &self,
        group_by: GroupBy,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<HashMap<String, GroupStats>, LedgerError> {
        let records = self.records.list_in_range(from, to).await?;
        Ok(group_records(&records, group_by))
    }
}
