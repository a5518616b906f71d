//! Consolidation Source Traits
//!
//! The daily consolidator never reaches into other components' storage
//! directly; it is handed an operation source and an AI-query source and
//! reads through them. This keeps the consolidator testable against
//! in-memory fakes and lets the AI accounting live outside this crate.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::operation::OperationRecord;
use crate::domain::errors::LedgerError;

/// One AI exchange billed to a bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiQueryRecord {
    pub bot_id: i64,
    pub tokens_total: i64,
    pub cost_usd: f64,
    pub created_at: DateTime<Utc>,
}

/// Read side of the operation ledger as the consolidator sees it.
#[async_trait]
pub trait OperationSource: Send + Sync {
    /// All closed operations for `bot_id` whose close time falls on `date`
    /// (UTC day window).
    async fn closed_operations_on(
        &self,
        bot_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<OperationRecord>, LedgerError>;
}

/// Read side of the external AI-query accounting.
#[async_trait]
pub trait AiQuerySource: Send + Sync {
    /// All AI queries billed to `bot_id` on `date` (UTC day window).
    async fn queries_on(
        &self,
        bot_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<AiQueryRecord>, LedgerError>;
}
