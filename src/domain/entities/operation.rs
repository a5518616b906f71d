//! Trading Operation Entity
//!
//! One operation per placed order. The mutable `stop_loss`/`take_profit`
//! pair tracks risk-management adjustments; the `_initial` pair is captured
//! once at creation and never rewritten, so risk-multiple consumers can
//! always recover the risk the trade was entered with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

use crate::domain::errors::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "market",
            OrderType::Limit => "limit",
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "market" => Ok(OrderType::Market),
            "limit" => Ok(OrderType::Limit),
            other => Err(LedgerError::InvalidData(format!(
                "unknown order type: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "buy",
            Direction::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Direction {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Direction::Buy),
            "sell" => Ok(Direction::Sell),
            other => Err(LedgerError::InvalidData(format!(
                "unknown direction: {}",
                other
            ))),
        }
    }
}

/// Operation lifecycle status.
///
/// The machine is Pending -> Open -> Closed. Pending and Open both accept
/// risk-management updates; only Open can close; nothing returns to Pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    Open,
    Closed,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Open => "open",
            OperationStatus::Closed => "closed",
        }
    }

    /// Whether a status change to `next` is allowed. Re-asserting the
    /// current status is a no-op and always allowed for non-terminal states.
    pub fn can_transition_to(&self, next: OperationStatus) -> bool {
        use OperationStatus::*;
        matches!(
            (self, next),
            (Pending, Pending) | (Pending, Open) | (Open, Open) | (Open, Closed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::Closed)
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OperationStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OperationStatus::Pending),
            "open" => Ok(OperationStatus::Open),
            "closed" => Ok(OperationStatus::Closed),
            other => Err(LedgerError::InvalidData(format!(
                "unknown operation status: {}",
                other
            ))),
        }
    }
}

/// Operation record in database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OperationRecord {
    pub id: i64,
    pub magic_number: i64,
    pub bot_id: i64,
    pub ia_id: i64,
    pub symbol: String,
    pub order_type: String, // "market" or "limit"
    pub direction: String,  // "buy" or "sell"
    pub suggested_price: f64,
    pub actual_entry_price: Option<f64>,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub stop_loss_initial: f64,
    pub take_profit_initial: f64,
    pub lot_size: f64,
    pub risk_percentage: f64,
    pub status: String, // "pending", "open" or "closed"
    pub profit_loss: Option<f64>,
    pub open_time: DateTime<Utc>,
    pub close_time: Option<DateTime<Utc>>,
    pub conversation_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OperationRecord {
    pub fn parsed_status(&self) -> Result<OperationStatus, LedgerError> {
        self.status.parse()
    }

    pub fn is_market(&self) -> bool {
        self.order_type == OrderType::Market.as_str()
    }

    /// Distance between the recorded entry price and the stop-loss captured
    /// at creation. This is the denominator for R-multiple calculations and
    /// is only meaningful once the order has filled.
    pub fn initial_risk_distance(&self) -> Option<f64> {
        self.actual_entry_price
            .map(|entry| (entry - self.stop_loss_initial).abs())
    }
}
