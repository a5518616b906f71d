//! Dual-Order Performance Entity
//!
//! One record per leg (market or limit) of a dual-order trade. Records are
//! append-only facts: the comparator joins two of them by magic number to
//! decide which leg performed better.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

use crate::domain::errors::LedgerError;

/// Whether an order actually filled. Market orders always activate; limit
/// orders may sit at their price and never trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationStatus {
    Activated,
    NotActivated,
    Pending,
}

impl ActivationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivationStatus::Activated => "activated",
            ActivationStatus::NotActivated => "not_activated",
            ActivationStatus::Pending => "pending",
        }
    }
}

impl std::fmt::Display for ActivationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActivationStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "activated" => Ok(ActivationStatus::Activated),
            "not_activated" => Ok(ActivationStatus::NotActivated),
            "pending" => Ok(ActivationStatus::Pending),
            other => Err(LedgerError::InvalidData(format!(
                "unknown activation status: {}",
                other
            ))),
        }
    }
}

/// Outcome of a market-vs-limit comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetterPerformer {
    Market,
    Limit,
    Tie,
}

impl BetterPerformer {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetterPerformer::Market => "market",
            BetterPerformer::Limit => "limit",
            BetterPerformer::Tie => "tie",
        }
    }

    /// Strict comparison: equal P/L is a tie, never silently one side.
    pub fn from_profit_loss(market_pl: f64, limit_pl: f64) -> Self {
        if market_pl > limit_pl {
            BetterPerformer::Market
        } else if market_pl < limit_pl {
            BetterPerformer::Limit
        } else {
            BetterPerformer::Tie
        }
    }
}

impl std::fmt::Display for BetterPerformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Performance record in database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PerformanceRecord {
    pub id: i64,
    pub magic_number: i64,
    pub bot_id: i64,
    pub symbol: String,
    pub order_type: String, // "market" or "limit"
    pub direction: String,  // "buy" or "sell"
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub lot_size: f64,
    pub profit_loss: f64,
    pub is_winner: bool,
    pub activation_status: String, // "activated", "not_activated" or "pending"
    pub open_time: DateTime<Utc>,
    pub close_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PerformanceRecord {
    pub fn is_activated(&self) -> bool {
        self.activation_status == ActivationStatus::Activated.as_str()
    }

    pub fn is_market(&self) -> bool {
        self.order_type == super::operation::OrderType::Market.as_str()
    }

    /// Realized P/L of this leg. A leg that never traded carries no P/L,
    /// whatever its stored column says.
    pub fn effective_profit_loss(&self) -> f64 {
        if self.is_activated() {
            self.profit_loss
        } else {
            0.0
        }
    }
}
