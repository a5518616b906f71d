//! Dual-Order Comparison
//!
//! Pure arithmetic over performance records. The central accounting rule:
//! a leg that never activated contributes zero to P/L totals and is excluded
//! from activated-only averages, but still counts toward the activation-rate
//! denominator. "Didn't trade" is not "lost money".

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

use crate::domain::entities::performance::{BetterPerformer, PerformanceRecord};

/// Pairwise comparison of the two legs of one dual order.
#[derive(Debug, Clone, Serialize)]
pub struct OperationPerformance {
    pub symbol: String,
    pub market_magic: i64,
    pub limit_magic: i64,
    pub market_profit_loss: f64,
    pub limit_profit_loss: f64,
    pub profit_loss_difference: f64,
    pub better_performer: BetterPerformer,
}

impl OperationPerformance {
    pub fn from_legs(market: &PerformanceRecord, limit: &PerformanceRecord) -> Self {
        let market_pl = market.effective_profit_loss();
        let limit_pl = limit.effective_profit_loss();
        OperationPerformance {
            symbol: market.symbol.clone(),
            market_magic: market.magic_number,
            limit_magic: limit.magic_number,
            market_profit_loss: market_pl,
            limit_profit_loss: limit_pl,
            profit_loss_difference: market_pl - limit_pl,
            better_performer: BetterPerformer::from_profit_loss(market_pl, limit_pl),
        }
    }
}

/// Running tally for one side (market or limit) of a set of legs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LegStats {
    pub count: i64,
    pub activated: i64,
    pub winners: i64,
    pub total_profit_loss: f64,
}

impl LegStats {
    pub fn record(&mut self, leg: &PerformanceRecord) {
        self.count += 1;
        if leg.is_activated() {
            self.activated += 1;
            self.total_profit_loss += leg.profit_loss;
            if leg.is_winner {
                self.winners += 1;
            }
        }
    }

    /// Share of legs that actually filled; 0 when there are no legs.
    pub fn activation_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.activated as f64 / self.count as f64
        }
    }

    /// Average P/L over activated legs only; 0 when none activated.
    pub fn avg_profit_loss(&self) -> f64 {
        if self.activated == 0 {
            0.0
        } else {
            self.total_profit_loss / self.activated as f64
        }
    }

    /// Winner share over activated legs only, as a percentage.
    pub fn win_rate(&self) -> f64 {
        if self.activated == 0 {
            0.0
        } else {
            self.winners as f64 / self.activated as f64 * 100.0
        }
    }
}

/// Daily aggregate for one side of the book.
#[derive(Debug, Clone, Serialize)]
pub struct LegDaily {
    pub count: i64,
    pub activated: i64,
    pub total_profit_loss: f64,
    pub activation_rate: f64,
    pub avg_profit_loss: f64,
}

impl From<&LegStats> for LegDaily {
    fn from(stats: &LegStats) -> Self {
        LegDaily {
            count: stats.count,
            activated: stats.activated,
            total_profit_loss: stats.total_profit_loss,
            activation_rate: stats.activation_rate(),
            avg_profit_loss: stats.avg_profit_loss(),
        }
    }
}

/// Market-vs-limit aggregate for one bot and one day.
#[derive(Debug, Clone, Serialize)]
pub struct DailyPerformanceComparison {
    pub bot_id: i64,
    pub date: NaiveDate,
    pub market: LegDaily,
    pub limit: LegDaily,
    pub better_daily_performer: BetterPerformer,
}

/// Split a day's records into market and limit tallies.
pub fn split_legs(records: &[PerformanceRecord]) -> (LegStats, LegStats) {
    let mut market = LegStats::default();
    let mut limit = LegStats::default();
    for record in records {
        if record.is_market() {
            market.record(record);
        } else {
            limit.record(record);
        }
    }
    (market, limit)
}

pub fn daily_comparison(
    bot_id: i64,
    date: NaiveDate,
    records: &[PerformanceRecord],
) -> DailyPerformanceComparison {
    let (market, limit) = split_legs(records);
    let better = BetterPerformer::from_profit_loss(market.total_profit_loss, limit.total_profit_loss);
    DailyPerformanceComparison {
        bot_id,
        date,
        market: LegDaily::from(&market),
        limit: LegDaily::from(&limit),
        better_daily_performer: better,
    }
}

/// Grouping dimension for aggregated statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Symbol,
    BotId,
    OrderType,
}

impl GroupBy {
    fn key_of(&self, record: &PerformanceRecord) -> String {
        match self {
            GroupBy::Symbol => record.symbol.clone(),
            GroupBy::BotId => record.bot_id.to_string(),
            GroupBy::OrderType => record.order_type.clone(),
        }
    }
}

/// Aggregate statistics for one group of legs.
#[derive(Debug, Clone, Serialize)]
pub struct GroupStats {
    pub operations: i64,
    pub activated: i64,
    pub winners: i64,
    pub total_profit_loss: f64,
    pub avg_profit_loss: f64,
    pub win_rate: f64,
    pub activation_rate: f64,
}

impl From<&LegStats> for GroupStats {
    fn from(stats: &LegStats) -> Self {
        GroupStats {
            operations: stats.count,
            activated: stats.activated,
            winners: stats.winners,
            total_profit_loss: stats.total_profit_loss,
            avg_profit_loss: stats.avg_profit_loss(),
            win_rate: stats.win_rate(),
            activation_rate: stats.activation_rate(),
        }
    }
}

/// Group records along the chosen dimension and tally each group.
pub fn group_records(records: &[PerformanceRecord], group_by: GroupBy) -> HashMap<String, GroupStats> {
    let mut tallies: HashMap<String, LegStats> = HashMap::new();
    for record in records {
        tallies
            .entry(group_by.key_of(record))
            .or_default()
            .record(record);
    }
    tallies
        .into_iter()
        .map(|(key, stats)| (key, GroupStats::from(&stats)))
        .collect()
}
