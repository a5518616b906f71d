//! Daily Consolidation Service
//!
//! Pulls a bot-day of closed operations and AI-query costs from the two
//! injected sources, derives one daily metrics row, and rolls stored rows
//! up per bot, across bots, and per methodology.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

use crate::domain::entities::daily_metrics::DailyMetricsRecord;
use crate::domain::errors::LedgerError;
use crate::domain::repositories::sources::{AiQuerySource, OperationSource};
use crate::domain::services::consolidation::{
    group_by_methodology, mean, mean_excluding_sentinel, sort_by_key_desc, summarize_operations,
    total_queries, MethodologyStats, RankBy,
};
use crate::persistence::metrics_repository::DailyMetricsRepository;
use crate::persistence::models::UpsertDailyMetrics;

/// Cross-day rollup for one bot.
#[derive(Debug, Clone, Serialize)]
pub struct BotStatistics {
    pub bot_id: i64,
    pub days: i64,
    pub total_operations: i64,
    pub winning_operations: i64,
    pub losing_operations: i64,
    pub total_profit_loss: f64,
    pub total_queries: i64,
    pub total_tokens: i64,
    pub total_ia_cost: f64,
    pub avg_winrate: f64,
    pub avg_profit_factor: f64,
}

/// Cross-day rollup over every bot with stored metrics in the window.
#[derive(Debug, Clone, Serialize)]
pub struct TotalStatistics {
    pub bots: i64,
    pub days: i64,
    pub total_operations: i64,
    pub winning_operations: i64,
    pub losing_operations: i64,
    pub total_profit_loss: f64,
    pub total_queries: i64,
    pub total_tokens: i64,
    pub total_ia_cost: f64,
    pub avg_winrate: f64,
    pub avg_profit_factor: f64,
}

/// Ranked methodology comparison. Best and worst are always judged by ROI,
/// whatever the requested ranking key; ties fall back to operation count
/// and then name, so the outcome never depends on iteration order.
#[derive(Debug, Clone, Serialize)]
pub struct MethodologyComparison {
    pub groups: Vec<MethodologyStats>,
    pub best_methodology: Option<String>,
    pub worst_methodology: Option<String>,
}

pub struct ConsolidationService {
    operations: Arc<dyn OperationSource>,
    ai_queries: Arc<dyn AiQuerySource>,
    metrics: DailyMetricsRepository,
}

impl ConsolidationService {
    pub fn new(
        operations: Arc<dyn OperationSource>,
        ai_queries: Arc<dyn AiQuerySource>,
        metrics: DailyMetricsRepository,
    ) -> Self {
        Self {
            operations,
            ai_queries,
            metrics,
        }
    }

    /// Consolidate one bot-day into a single daily metrics row.
    ///
    /// Re-running with unchanged sources overwrites the row with identical
    /// values; there is never more than one row per (bot_id, date).
    pub async fn consolidate(
        &self,
        bot_id: i64,
        date: NaiveDate,
    ) -> Result<DailyMetricsRecord, LedgerError> {
        let operations = self.operations.closed_operations_on(bot_id, date).await?;
        let queries = self.ai_queries.queries_on(bot_id, date).await?;

        let summary = summarize_operations(&operations);
        let totals = total_queries(&queries);

        let record = self
            .metrics
            .upsert(UpsertDailyMetrics {
                bot_id,
                date,
                total_operations: summary.total_operations,
                winning_operations: summary.winning_operations,
                losing_operations: summary.losing_operations,
                profit_loss_total: summary.profit_loss_total,
                profit_loss_market: summary.profit_loss_market,
                profit_loss_limit: summary.profit_loss_limit,
                total_queries: totals.total_queries,
                total_tokens: totals.total_tokens,
                total_ia_cost: totals.total_ia_cost,
                winrate: summary.winrate,
                profit_factor: summary.profit_factor,
            })
            .await?;

        info!(
            "Consolidated bot {} on {}: {} operations, winrate {:.1}%, {} queries",
            bot_id, date, record.total_operations, record.winrate, record.total_queries
        );
        Ok(record)
    }

    /// Roll one bot's stored daily rows up over an inclusive date range.
    ///
    /// Winrate is averaged over all days; the profit-factor average skips
    /// no-loss sentinel days so one perfect day does not distort the mean.
    pub async fn statistics_by_bot(
        &self,
        bot_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<BotStatistics, LedgerError> {
        let rows = self.metrics.list_for_bot(bot_id, from, to).await?;
        Ok(BotStatistics {
            bot_id,
            days: rows.len() as i64,
            total_operations: rows.iter().map(|r| r.total_operations).sum(),
            winning_operations: rows.iter().map(|r| r.winning_operations).sum(),
            losing_operations: rows.iter().map(|r| r.losing_operations).sum(),
            total_profit_loss: rows.iter().map(|r| r.profit_loss_total).sum(),
            total_queries: rows.iter().map(|r| r.total_queries).sum(),
            total_tokens: rows.iter().map(|r| r.total_tokens).sum(),
            total_ia_cost: rows.iter().map(|r| r.total_ia_cost).sum(),
            avg_winrate: mean(rows.iter().map(|r| r.winrate)),
            avg_profit_factor: mean_excluding_sentinel(rows.iter().map(|r| r.profit_factor)),
        })
    }

    /// Roll every stored bot-day in the window up into one aggregate.
    pub async fn total_statistics(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<TotalStatistics, LedgerError> {
        let rows = self.metrics.list_in_range(from, to).await?;
        let bots: HashSet<i64> = rows.iter().map(|r| r.bot_id).collect();
        Ok(TotalStatistics {
            bots: bots.len() as i64,
            days: rows.len() as i64,
            total_operations: rows.iter().map(|r| r.total_operations).sum(),
            winning_operations: rows.iter().map(|r| r.winning_operations).sum(),
            losing_operations: rows.iter().map(|r| r.losing_operations).sum(),
            total_profit_loss: rows.iter().map(|r| r.profit_loss_total).sum(),
            total_queries: rows.iter().map(|r| r.total_queries).sum(),
            total_tokens: rows.iter().map(|r| r.total_tokens).sum(),
            total_ia_cost: rows.iter().map(|r| r.total_ia_cost).sum(),
            avg_winrate: mean(rows.iter().map(|r| r.winrate)),
            avg_profit_factor: mean_excluding_sentinel(rows.iter().map(|r| r.profit_factor)),
        })
    }

    /// Compare groups of bots sharing a methodology tag over the window,
    /// ranked by the requested key.
    pub async fn compare_methodologies(
        &self,
        assignments: &HashMap<i64, String>,
        from: NaiveDate,
        to: NaiveDate,
        rank_by: RankBy,
    ) -> Result<MethodologyComparison, LedgerError> {
        let rows = self.metrics.list_in_range(from, to).await?;
        let mut groups = group_by_methodology(&rows, assignments);
        sort_by_key_desc(&mut groups, rank_by);

        let mut by_roi = groups.clone();
        sort_by_key_desc(&mut by_roi, RankBy::Roi);
        let best_methodology = by_roi.first().map(|g| g.methodology.clone());
        let worst_methodology = by_roi.last().map(|g| g.methodology.clone());

        Ok(MethodologyComparison {
            groups,
            best_methodology,
            worst_methodology,
        })
    }
}
