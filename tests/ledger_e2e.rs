//! Ledger End-to-End Tests
//!
//! Full-flow scenarios across the three components: operations move through
//! their lifecycle in the ledger, dual-order legs are registered and
//! compared, and a day of activity is consolidated into metrics.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use tradeledger::application::services::comparison_service::ComparisonService;
use tradeledger::application::services::consolidation_service::ConsolidationService;
use tradeledger::domain::entities::operation::{Direction, OperationStatus, OrderType};
use tradeledger::domain::entities::performance::{ActivationStatus, BetterPerformer};
use tradeledger::domain::errors::LedgerError;
use tradeledger::domain::repositories::sources::{AiQueryRecord, AiQuerySource};
use tradeledger::domain::services::consolidation::RankBy;
use tradeledger::persistence::metrics_repository::DailyMetricsRepository;
use tradeledger::persistence::models::{
    CreateOperation, OperationFilter, RegisterPerformance, UpdateOperation,
};
use tradeledger::persistence::operation_repository::OperationRepository;
use tradeledger::persistence::{init_database, DbPool};

struct FakeAiQueries {
    queries: Vec<AiQueryRecord>,
}

#[async_trait]
impl AiQuerySource for FakeAiQueries {
    async fn queries_on(
        &self,
        bot_id: i64,
        _date: NaiveDate,
    ) -> Result<Vec<AiQueryRecord>, LedgerError> {
        Ok(self
            .queries
            .iter()
            .filter(|q| q.bot_id == bot_id)
            .cloned()
            .collect())
    }
}

fn operation(magic_number: i64, order_type: OrderType) -> CreateOperation {
    CreateOperation {
        magic_number,
        bot_id: 1,
        ia_id: 2,
        symbol: "EURUSD".to_string(),
        order_type,
        direction: Direction::Buy,
        suggested_price: 1.1000,
        actual_entry_price: Some(1.1000),
        stop_loss: 1.0950,
        take_profit: 1.1100,
        stop_loss_initial: None,
        take_profit_initial: None,
        lot_size: 0.1,
        risk_percentage: 1.0,
        status: OperationStatus::Open,
        open_time: None,
        conversation_id: Some("conv-e2e".to_string()),
    }
}

fn leg(
    magic_number: i64,
    order_type: OrderType,
    profit_loss: f64,
    is_winner: bool,
    activation_status: ActivationStatus,
) -> RegisterPerformance {
    RegisterPerformance {
        magic_number,
        bot_id: 1,
        symbol: "EURUSD".to_string(),
        order_type,
        direction: Direction::Buy,
        entry_price: 1.1000,
        exit_price: None,
        lot_size: 0.1,
        profit_loss,
        is_winner,
        activation_status,
        open_time: None,
        close_time: None,
    }
}

fn consolidation_service(pool: DbPool, queries: Vec<AiQueryRecord>) -> ConsolidationService {
    ConsolidationService::new(
        Arc::new(OperationRepository::new(pool.clone())),
        Arc::new(FakeAiQueries { queries }),
        DailyMetricsRepository::new(pool),
    )
}

#[tokio::test]
async fn test_breakeven_stop_preserves_initial_risk() {
    let pool = init_database("sqlite::memory:").await.unwrap();
    let ledger = OperationRepository::new(pool);

    // Buy market at 1.1000, SL 1.0950, TP 1.1100; initials auto-filled.
    let created = ledger.create(operation(1001, OrderType::Market)).await.unwrap();
    assert_eq!(created.stop_loss_initial, 1.0950);

    // Move the stop to breakeven.
    let update = UpdateOperation {
        stop_loss: Some(1.1000),
        ..Default::default()
    };
    ledger.update(created.id, update).await.unwrap().unwrap();

    // Close with +30.
    let closed = ledger.close(created.id, 30.0).await.unwrap();

    assert_eq!(closed.stop_loss, 1.1000);
    assert_eq!(closed.stop_loss_initial, 1.0950);
    assert_eq!(closed.status, "closed");
    assert_eq!(closed.profit_loss, Some(30.0));
    assert!(closed.close_time.is_some());

    // The preserved initial stop still yields the entry risk distance.
    assert!((closed.initial_risk_distance().unwrap() - 0.0050).abs() < 1e-9);
}

#[tokio::test]
async fn test_dual_order_comparison_scenario() {
    let pool = init_database("sqlite::memory:").await.unwrap();
    let comparator = ComparisonService::new(pool);

    comparator
        .register(leg(1, OrderType::Market, 50.0, true, ActivationStatus::Activated))
        .await
        .unwrap();
    comparator
        .register(leg(2, OrderType::Limit, 0.0, false, ActivationStatus::NotActivated))
        .await
        .unwrap();

    let pairwise = comparator.compare_operation(1, 2).await.unwrap();
    assert_eq!(pairwise.better_performer, BetterPerformer::Market);
    assert_eq!(pairwise.profit_loss_difference, 50.0);

    let daily = comparator
        .compare_daily(1, Utc::now().date_naive())
        .await
        .unwrap();
    assert_eq!(daily.market.activation_rate, 1.0);
    assert_eq!(daily.limit.activation_rate, 0.0);
    assert_eq!(daily.better_daily_performer, BetterPerformer::Market);
}

#[tokio::test]
async fn test_full_day_consolidation_flow() {
    let pool = init_database("sqlite::memory:").await.unwrap();
    let ledger = OperationRepository::new(pool.clone());

    // 7 winners (+$100 each) and 3 losers (-$100 each).
    for magic in 1..=10 {
        let order_type = if magic % 2 == 0 {
            OrderType::Limit
        } else {
            OrderType::Market
        };
        let created = ledger.create(operation(magic, order_type)).await.unwrap();
        let profit_loss = if magic <= 7 { 100.0 } else { -100.0 };
        ledger.close(created.id, profit_loss).await.unwrap();
    }

    let queries = vec![
        AiQueryRecord {
            bot_id: 1,
            tokens_total: 1800,
            cost_usd: 0.05,
            created_at: Utc::now(),
        },
        AiQueryRecord {
            bot_id: 1,
            tokens_total: 1200,
            cost_usd: 0.03,
            created_at: Utc::now(),
        },
    ];
    let service = consolidation_service(pool.clone(), queries);

    let today = Utc::now().date_naive();
    let record = service.consolidate(1, today).await.unwrap();

    assert_eq!(record.total_operations, 10);
    assert_eq!(record.winning_operations, 7);
    assert_eq!(record.losing_operations, 3);
    assert_eq!(record.winrate, 70.0);
    assert!((record.profit_factor - 700.0 / 300.0).abs() < 1e-9);
    assert_eq!(record.total_tokens, 3000);

    // Re-running changes nothing and leaves exactly one row.
    let again = service.consolidate(1, today).await.unwrap();
    assert_eq!(again.id, record.id);
    assert_eq!(again.winrate, record.winrate);

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM daily_metrics")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 1);

    // The consolidated day rolls up into per-bot statistics.
    let stats = service.statistics_by_bot(1, today, today).await.unwrap();
    assert_eq!(stats.days, 1);
    assert_eq!(stats.total_operations, 10);
    assert_eq!(stats.avg_winrate, 70.0);

    // And into a methodology comparison.
    let assignments = HashMap::from([(1, "breakout".to_string())]);
    let comparison = service
        .compare_methodologies(&assignments, today, today, RankBy::Roi)
        .await
        .unwrap();
    assert_eq!(comparison.groups.len(), 1);
    assert_eq!(comparison.best_methodology.as_deref(), Some("breakout"));
}

#[tokio::test]
async fn test_duplicate_magic_rejected_across_components() {
    let pool = init_database("sqlite::memory:").await.unwrap();
    let ledger = OperationRepository::new(pool.clone());
    let comparator = ComparisonService::new(pool);

    ledger.create(operation(1001, OrderType::Market)).await.unwrap();
    let err = ledger.create(operation(1001, OrderType::Limit)).await.unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateKey(_)));

    // The comparator keys its own table; the same magic registers once.
    comparator
        .register(leg(1001, OrderType::Market, 0.0, false, ActivationStatus::Pending))
        .await
        .unwrap();
    let err = comparator
        .register(leg(1001, OrderType::Market, 0.0, false, ActivationStatus::Pending))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateKey(_)));
}

#[tokio::test]
async fn test_listing_survives_mixed_lifecycle() {
    let pool = init_database("sqlite::memory:").await.unwrap();
    let ledger = OperationRepository::new(pool);

    let first = ledger.create(operation(1, OrderType::Market)).await.unwrap();
    ledger.create(operation(2, OrderType::Limit)).await.unwrap();
    ledger.close(first.id, 12.5).await.unwrap();

    let open = ledger
        .list(&OperationFilter {
            status: Some(OperationStatus::Open),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].magic_number, 2);

    let closed_count = ledger
        .count(&OperationFilter {
            status: Some(OperationStatus::Closed),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(closed_count, 1);

    // Records serialize cleanly for the query surface upward.
    let json = serde_json::to_string(&open[0]).unwrap();
    assert!(json.contains("\"magic_number\":2"));
}
