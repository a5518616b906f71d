//! Repository Input Models
//!
//! Typed write requests for the repositories. Partial updates are explicit
//! structs with optional fields, so what a caller may touch is enforced by
//! the compiler: `UpdateOperation` has no way to express the `_initial`
//! risk pair, `profit_loss`, or `close_time`.

use chrono::{DateTime, Utc};

use crate::domain::entities::operation::{Direction, OperationStatus, OrderType};
use crate::domain::entities::performance::ActivationStatus;
use crate::domain::errors::LedgerError;

/// Bounded bot identifier pool for dual-performance records.
pub const BOT_ID_MIN: i64 = 1;
pub const BOT_ID_MAX: i64 = 5;

/// Create operation input
#[derive(Debug, Clone)]
pub struct CreateOperation {
    pub magic_number: i64,
    pub bot_id: i64,
    pub ia_id: i64,
    pub symbol: String,
    pub order_type: OrderType,
    pub direction: Direction,
    pub suggested_price: f64,
    pub actual_entry_price: Option<f64>,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Defaults to `stop_loss` when omitted (auto-fill at creation).
    pub stop_loss_initial: Option<f64>,
    /// Defaults to `take_profit` when omitted (auto-fill at creation).
    pub take_profit_initial: Option<f64>,
    pub lot_size: f64,
    pub risk_percentage: f64,
    /// Starting status; an operation cannot be born closed.
    pub status: OperationStatus,
    /// Defaults to now when omitted.
    pub open_time: Option<DateTime<Utc>>,
    pub conversation_id: Option<String>,
}

impl CreateOperation {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.symbol.trim().is_empty() {
            return Err(LedgerError::InvalidData(
                "symbol must not be empty".to_string(),
            ));
        }
        if self.lot_size <= 0.0 {
            return Err(LedgerError::InvalidData(format!(
                "lot_size must be positive, got {}",
                self.lot_size
            )));
        }
        if self.status.is_terminal() {
            return Err(LedgerError::InvalidData(
                "operations cannot be created in closed status".to_string(),
            ));
        }
        Ok(())
    }
}

/// Partial update input for an operation.
///
/// Only risk-management fields and the forward status are writable here.
/// Closing (status, profit_loss, close_time together) goes through the
/// dedicated close call.
#[derive(Debug, Clone, Default)]
pub struct UpdateOperation {
    pub actual_entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub status: Option<OperationStatus>,
    pub conversation_id: Option<String>,
}

/// Conjunctive filters for operation listing and counting.
#[derive(Debug, Clone, Default)]
pub struct OperationFilter {
    pub status: Option<OperationStatus>,
    pub symbol: Option<String>,
    pub bot_id: Option<i64>,
    pub order_type: Option<OrderType>,
    /// Applies to `list` only.
    pub limit: Option<i64>,
}

/// Register performance record input
#[derive(Debug, Clone)]
pub struct RegisterPerformance {
    pub magic_number: i64,
    pub bot_id: i64,
    pub symbol: String,
    pub order_type: OrderType,
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub lot_size: f64,
    pub profit_loss: f64,
    pub is_winner: bool,
    pub activation_status: ActivationStatus,
    /// Defaults to now when omitted.
    pub open_time: Option<DateTime<Utc>>,
    pub close_time: Option<DateTime<Utc>>,
}

impl RegisterPerformance {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.symbol.trim().is_empty() {
            return Err(LedgerError::InvalidData(
                "symbol must not be empty".to_string(),
            ));
        }
        if self.lot_size <= 0.0 {
            return Err(LedgerError::InvalidData(format!(
                "lot_size must be positive, got {}",
                self.lot_size
            )));
        }
        if !(BOT_ID_MIN..=BOT_ID_MAX).contains(&self.bot_id) {
            return Err(LedgerError::InvalidData(format!(
                "bot_id must be between {} and {}, got {}",
                BOT_ID_MIN, BOT_ID_MAX, self.bot_id
            )));
        }
        Ok(())
    }
}

/// Upsert input for one consolidated (bot_id, date) row.
#[derive(Debug, Clone)]
pub struct UpsertDailyMetrics {
    pub bot_id: i64,
    pub date: chrono::NaiveDate,
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
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_input() -> CreateOperation {
        CreateOperation {
            magic_number: 1001,
            bot_id: 1,
            ia_id: 1,
            symbol: "EURUSD".to_string(),
            order_type: OrderType::Market,
            direction: Direction::Buy,
            suggested_price: 1.1000,
            actual_entry_price: Some(1.1001),
            stop_loss: 1.0950,
            take_profit: 1.1100,
            stop_loss_initial: None,
            take_profit_initial: None,
            lot_size: 0.1,
            risk_percentage: 1.0,
            status: OperationStatus::Open,
            open_time: None,
            conversation_id: None,
        }
    }

    fn register_input() -> RegisterPerformance {
        RegisterPerformance {
            magic_number: 2001,
            bot_id: 1,
            symbol: "EURUSD".to_string(),
            order_type: OrderType::Limit,
            direction: Direction::Buy,
            entry_price: 1.0980,
            exit_price: None,
            lot_size: 0.1,
            profit_loss: 0.0,
            is_winner: false,
            activation_status: ActivationStatus::Pending,
            open_time: None,
            close_time: None,
        }
    }

    #[test]
    fn test_create_operation_valid() {
        assert!(create_input().validate().is_ok());
    }

    #[test]
    fn test_create_operation_rejects_empty_symbol() {
        let mut input = create_input();
        input.symbol = "  ".to_string();
        assert!(matches!(
            input.validate(),
            Err(LedgerError::InvalidData(_))
        ));
    }

    #[test]
    fn test_create_operation_rejects_non_positive_lot() {
        let mut input = create_input();
        input.lot_size = 0.0;
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_create_operation_rejects_closed_status() {
        let mut input = create_input();
        input.status = OperationStatus::Closed;
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_register_performance_bot_id_bounds() {
        let mut input = register_input();
        assert!(input.validate().is_ok());

        input.bot_id = 0;
        assert!(input.validate().is_err());

        input.bot_id = 6;
        assert!(input.validate().is_err());

        input.bot_id = 5;
        assert!(input.validate().is_ok());
    }
}
