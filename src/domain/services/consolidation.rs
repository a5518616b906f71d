//! Daily Consolidation Arithmetic
//!
//! Pure computation from raw facts to aggregates: daily summaries from
//! closed operations, cross-day rollups, and methodology comparisons.
//! The profit factor is always the gross-gain / gross-loss ratio; when a
//! window has gains and no losses at all, the factor is pinned to a
//! sentinel so "no downside observed" stays distinguishable from "no data".

use serde::Serialize;
use std::collections::HashMap;

use crate::domain::entities::daily_metrics::DailyMetricsRecord;
use crate::domain::entities::operation::OperationRecord;
use crate::domain::repositories::sources::AiQueryRecord;

/// Profit factor reported when there are gains but zero losses.
pub const PROFIT_FACTOR_NO_LOSS: f64 = 999.0;

/// Winning/losing split and derived ratios for one bot-day of closed
/// operations. Zero-P/L operations count as neither winning nor losing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DailySummary {
    pub total_operations: i64,
    pub winning_operations: i64,
    pub losing_operations: i64,
    pub profit_loss_total: f64,
    pub profit_loss_market: f64,
    pub profit_loss_limit: f64,
    pub winrate: f64,
    pub profit_factor: f64,
}

/// Token and cost totals over one bot-day of AI queries.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryTotals {
    pub total_queries: i64,
    pub total_tokens: i64,
    pub total_ia_cost: f64,
}

pub fn winrate(winning: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        winning as f64 / total as f64 * 100.0
    }
}

/// Gross gain / gross loss. `gross_loss` is passed as a magnitude.
pub fn profit_factor(gross_profit: f64, gross_loss: f64) -> f64 {
    if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        PROFIT_FACTOR_NO_LOSS
    } else {
        0.0
    }
}

/// Summarize a day's closed operations.
pub fn summarize_operations(operations: &[OperationRecord]) -> DailySummary {
    let mut summary = DailySummary::default();
    let mut gross_profit = 0.0;
    let mut gross_loss = 0.0;

    for op in operations {
        let pl = op.profit_loss.unwrap_or(0.0);
        summary.total_operations += 1;
        summary.profit_loss_total += pl;
        if op.is_market() {
            summary.profit_loss_market += pl;
        } else {
            summary.profit_loss_limit += pl;
        }
        if pl > 0.0 {
            summary.winning_operations += 1;
            gross_profit += pl;
        } else if pl < 0.0 {
            summary.losing_operations += 1;
            gross_loss += pl.abs();
        }
    }

    summary.winrate = winrate(summary.winning_operations, summary.total_operations);
    summary.profit_factor = profit_factor(gross_profit, gross_loss);
    summary
}

/// Sum a day's AI queries.
pub fn total_queries(queries: &[AiQueryRecord]) -> QueryTotals {
    let mut totals = QueryTotals::default();
    for query in queries {
        totals.total_queries += 1;
        totals.total_tokens += query.tokens_total;
        totals.total_ia_cost += query.cost_usd;
    }
    totals
}

/// Mean of `values` with the no-loss sentinel excluded, so one perfect day
/// does not distort a profit-factor average. 0 when nothing remains.
pub fn mean_excluding_sentinel(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in values {
        if value != PROFIT_FACTOR_NO_LOSS {
            sum += value;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

pub fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in values {
        sum += value;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Cross-day rollup of one methodology's bots.
#[derive(Debug, Clone, Serialize)]
pub struct MethodologyStats {
    pub methodology: String,
    pub bot_ids: Vec<i64>,
    pub days: i64,
    pub total_operations: i64,
    pub winning_operations: i64,
    pub losing_operations: i64,
    pub total_profit_loss: f64,
    pub total_ia_cost: f64,
    pub net_profit: f64,
    pub roi: f64,
    pub avg_winrate: f64,
    pub avg_profit_factor: f64,
}

/// Ranking key for methodology comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankBy {
    Roi,
    NetProfit,
    TotalProfitLoss,
    Winrate,
}

impl MethodologyStats {
    fn rank_value(&self, rank_by: RankBy) -> f64 {
        match rank_by {
            RankBy::Roi => self.roi,
            RankBy::NetProfit => self.net_profit,
            RankBy::TotalProfitLoss => self.total_profit_loss,
            RankBy::Winrate => self.avg_winrate,
        }
    }
}

/// Return on the AI spend, as a percentage. A methodology with no recorded
/// cost reports 0 rather than dividing by zero.
pub fn roi(total_profit_loss: f64, total_ia_cost: f64) -> f64 {
    if total_ia_cost > 0.0 {
        (total_profit_loss - total_ia_cost) / total_ia_cost * 100.0
    } else {
        0.0
    }
}

/// Group daily metrics rows by the methodology their bot is assigned to and
/// roll each group up. Rows for bots without an assignment are skipped.
pub fn group_by_methodology(
    rows: &[DailyMetricsRecord],
    assignments: &HashMap<i64, String>,
) -> Vec<MethodologyStats> {
    let mut grouped: HashMap<&str, Vec<&DailyMetricsRecord>> = HashMap::new();
    for row in rows {
        if let Some(methodology) = assignments.get(&row.bot_id) {
            grouped.entry(methodology.as_str()).or_default().push(row);
        }
    }

    let mut stats: Vec<MethodologyStats> = grouped
        .into_iter()
        .map(|(methodology, rows)| {
            let mut bot_ids: Vec<i64> = rows.iter().map(|r| r.bot_id).collect();
            bot_ids.sort_unstable();
            bot_ids.dedup();

            let total_profit_loss: f64 = rows.iter().map(|r| r.profit_loss_total).sum();
            let total_ia_cost: f64 = rows.iter().map(|r| r.total_ia_cost).sum();

            MethodologyStats {
                methodology: methodology.to_string(),
                bot_ids,
                days: rows.len() as i64,
                total_operations: rows.iter().map(|r| r.total_operations).sum(),
                winning_operations: rows.iter().map(|r| r.winning_operations).sum(),
                losing_operations: rows.iter().map(|r| r.losing_operations).sum(),
                total_profit_loss,
                total_ia_cost,
                net_profit: total_profit_loss - total_ia_cost,
                roi: roi(total_profit_loss, total_ia_cost),
                avg_winrate: mean(rows.iter().map(|r| r.winrate)),
                avg_profit_factor: mean_excluding_sentinel(rows.iter().map(|r| r.profit_factor)),
            }
        })
        .collect();

    // Deterministic base order regardless of hash-map iteration.
    sort_by_key_desc(&mut stats, RankBy::Roi);
    stats
}

/// Sort descending by the requested key, with ties broken by operation
/// count (descending) and then methodology name, so the order never depends
/// on map iteration.
pub fn sort_by_key_desc(stats: &mut [MethodologyStats], rank_by: RankBy) {
    stats.sort_by(|a, b| {
        b.rank_value(rank_by)
            .partial_cmp(&a.rank_value(rank_by))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.total_operations.cmp(&a.total_operations))
            .then(a.methodology.cmp(&b.methodology))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn closed_op(order_type: &str, profit_loss: f64) -> OperationRecord {
        OperationRecord {
            id: 0,
            magic_number: 0,
            bot_id: 1,
            ia_id: 1,
            symbol: "EURUSD".to_string(),
            order_type: order_type.to_string(),
            direction: "buy".to_string(),
            suggested_price: 1.1,
            actual_entry_price: Some(1.1),
            stop_loss: 1.09,
            take_profit: 1.12,
            stop_loss_initial: 1.09,
            take_profit_initial: 1.12,
            lot_size: 0.1,
            risk_percentage: 1.0,
            status: "closed".to_string(),
            profit_loss: Some(profit_loss),
            open_time: Utc::now(),
            close_time: Some(Utc::now()),
            conversation_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn metrics_row(
        bot_id: i64,
        date: &str,
        total_operations: i64,
        profit_loss_total: f64,
        total_ia_cost: f64,
        winrate: f64,
        profit_factor: f64,
    ) -> DailyMetricsRecord {
        DailyMetricsRecord {
            id: 0,
            bot_id,
            date: date.parse().unwrap(),
            total_operations,
            winning_operations: 0,
            losing_operations: 0,
            profit_loss_total,
            profit_loss_market: 0.0,
            profit_loss_limit: 0.0,
            total_queries: 0,
            total_tokens: 0,
            total_ia_cost,
            winrate,
            profit_factor,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_summarize_seven_winners_three_losers() {
        let mut ops: Vec<OperationRecord> =
            (0..7).map(|_| closed_op("market", 100.0)).collect();
        ops.extend((0..3).map(|_| closed_op("limit", -100.0)));

        let summary = summarize_operations(&ops);
        assert_eq!(summary.total_operations, 10);
        assert_eq!(summary.winning_operations, 7);
        assert_eq!(summary.losing_operations, 3);
        assert_eq!(summary.winrate, 70.0);
        assert!((summary.profit_factor - 700.0 / 300.0).abs() < 1e-9);
        assert_eq!(summary.profit_loss_total, 400.0);
        assert_eq!(summary.profit_loss_market, 700.0);
        assert_eq!(summary.profit_loss_limit, -300.0);
    }

    #[test]
    fn test_summarize_zero_pl_is_neither_win_nor_loss() {
        let ops = vec![closed_op("market", 0.0), closed_op("market", 50.0)];
        let summary = summarize_operations(&ops);
        assert_eq!(summary.total_operations, 2);
        assert_eq!(summary.winning_operations, 1);
        assert_eq!(summary.losing_operations, 0);
        assert_eq!(summary.winrate, 50.0);
    }

    #[test]
    fn test_profit_factor_edge_cases() {
        // No operations at all.
        assert_eq!(summarize_operations(&[]).profit_factor, 0.0);

        // Gains and zero losses: sentinel.
        let gains = vec![closed_op("market", 80.0)];
        assert_eq!(summarize_operations(&gains).profit_factor, PROFIT_FACTOR_NO_LOSS);

        // Losses and zero gains.
        let losses = vec![closed_op("market", -80.0)];
        assert_eq!(summarize_operations(&losses).profit_factor, 0.0);
    }

    #[test]
    fn test_total_queries_sums_tokens_and_cost() {
        let queries = vec![
            AiQueryRecord {
                bot_id: 1,
                tokens_total: 1200,
                cost_usd: 0.04,
                created_at: Utc::now(),
            },
            AiQueryRecord {
                bot_id: 1,
                tokens_total: 800,
                cost_usd: 0.02,
                created_at: Utc::now(),
            },
        ];
        let totals = total_queries(&queries);
        assert_eq!(totals.total_queries, 2);
        assert_eq!(totals.total_tokens, 2000);
        assert!((totals.total_ia_cost - 0.06).abs() < 1e-12);
    }

    #[test]
    fn test_mean_excluding_sentinel() {
        let values = vec![2.0, PROFIT_FACTOR_NO_LOSS, 4.0];
        assert_eq!(mean_excluding_sentinel(values), 3.0);

        // All sentinel days collapse to 0, not 999.
        assert_eq!(
            mean_excluding_sentinel(vec![PROFIT_FACTOR_NO_LOSS, PROFIT_FACTOR_NO_LOSS]),
            0.0
        );
    }

    #[test]
    fn test_roi_zero_cost_reports_zero() {
        assert_eq!(roi(500.0, 0.0), 0.0);
        assert!((roi(300.0, 100.0) - 200.0).abs() < 1e-9);
        assert!((roi(50.0, 100.0) - -50.0).abs() < 1e-9);
    }

    #[test]
    fn test_group_by_methodology_sums_and_ranks() {
        let rows = vec![
            metrics_row(1, "2024-03-11", 10, 300.0, 100.0, 60.0, 2.0),
            metrics_row(2, "2024-03-11", 5, 100.0, 100.0, 40.0, 1.0),
            metrics_row(1, "2024-03-12", 8, 100.0, 100.0, 50.0, PROFIT_FACTOR_NO_LOSS),
        ];
        let mut assignments = HashMap::new();
        assignments.insert(1, "scalping".to_string());
        assignments.insert(2, "swing".to_string());

        let stats = group_by_methodology(&rows, &assignments);
        assert_eq!(stats.len(), 2);

        // scalping: pl 400 over cost 200 -> roi 100%; swing: pl 100 over
        // cost 100 -> roi 0%. Ranked by roi descending.
        assert_eq!(stats[0].methodology, "scalping");
        assert_eq!(stats[0].days, 2);
        assert_eq!(stats[0].total_operations, 18);
        assert!((stats[0].roi - 100.0).abs() < 1e-9);
        assert!((stats[0].net_profit - 200.0).abs() < 1e-9);
        // Sentinel day excluded from the profit-factor average.
        assert_eq!(stats[0].avg_profit_factor, 2.0);

        assert_eq!(stats[1].methodology, "swing");
        assert_eq!(stats[1].roi, 0.0);
    }

    #[test]
    fn test_unassigned_bots_are_skipped() {
        let rows = vec![metrics_row(9, "2024-03-11", 3, 50.0, 10.0, 100.0, 5.0)];
        let assignments = HashMap::new();
        assert!(group_by_methodology(&rows, &assignments).is_empty());
    }

    #[test]
    fn test_rank_tie_break_is_deterministic() {
        let mut stats = group_by_methodology(
            &[
                metrics_row(1, "2024-03-11", 10, 200.0, 100.0, 60.0, 2.0),
                metrics_row(2, "2024-03-11", 5, 200.0, 100.0, 60.0, 2.0),
            ],
            &HashMap::from([(1, "alpha".to_string()), (2, "beta".to_string())]),
        );

        // Identical roi and distinct operation counts: more operations first.
        sort_by_key_desc(&mut stats, RankBy::Roi);
        assert_eq!(stats[0].methodology, "alpha");

        // Fully identical metrics fall back to name order.
        let mut stats = group_by_methodology(
            &[
                metrics_row(1, "2024-03-11", 5, 200.0, 100.0, 60.0, 2.0),
                metrics_row(2, "2024-03-11", 5, 200.0, 100.0, 60.0, 2.0),
            ],
            &HashMap::from([(1, "zeta".to_string()), (2, "beta".to_string())]),
        );
        sort_by_key_desc(&mut stats, RankBy::NetProfit);
        assert_eq!(stats[0].methodology, "beta");
        assert_eq!(stats[1].methodology, "zeta");
    }
}
