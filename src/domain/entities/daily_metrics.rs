//! Daily Metrics Entity
//!
//! Derived per-(bot, day) aggregate. Rows are never authored directly:
//! the consolidator recomputes them from closed operations and AI-query
//! costs, and re-running a consolidation overwrites the existing row.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Daily metrics record in database, unique on (bot_id, date).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DailyMetricsRecord {
    pub id: i64,
    pub bot_id: i64,
    pub date: NaiveDate,
    pub total_operations: i64,
    pub winning_operations: i64,
    pub losing_operations: i64,
    pub profit_loss_total: f64,
    pub profit_loss_market: f64,
    pub profit_loss_limit: f64,
    pub total_queries: i64,
    pub total_tokens: i64,
    pub total_ia_cost: f64,
    pub winrate: f64,
    pub profit_factor: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DailyMetricsRecord {
    /// Profit after AI costs for the day.
    pub fn net_profit(&self) -> f64 {
        self.profit_loss_total - self.total_ia_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_net_profit_subtracts_ai_cost() {
        let record = DailyMetricsRecord {
            id: 1,
            bot_id: 1,
            date: "2024-03-11".parse().unwrap(),
            total_operations: 4,
            winning_operations: 3,
            losing_operations: 1,
            profit_loss_total: 120.0,
            profit_loss_market: 80.0,
            profit_loss_limit: 40.0,
            total_queries: 6,
            total_tokens: 3000,
            total_ia_cost: 20.0,
            winrate: 75.0,
            profit_factor: 3.0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(record.net_profit(), 100.0);
    }
}
