//! Operation Ledger Repository
//!
//! Data access layer for trading operations. Lifecycle rules are enforced
//! here: magic numbers are unique for all time, the `_initial` risk pair is
//! written exactly once at creation, and profit_loss/close_time are only
//! ever set together by the close call.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, error};

use super::models::{CreateOperation, OperationFilter, UpdateOperation};
use super::{day_bounds, DbPool};
use crate::domain::entities::operation::{OperationRecord, OperationStatus};
use crate::domain::errors::LedgerError;
use crate::domain::repositories::sources::OperationSource;

/// Operation repository
pub struct OperationRepository {
    pool: DbPool,
}

impl OperationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a new operation.
    ///
    /// When the initial stop-loss/take-profit are omitted they are filled
    /// from the supplied current values, so the risk captured at creation
    /// is never lost.
    ///
    /// # Errors
    /// - `InvalidData` for an empty symbol, non-positive lot size, or an
    ///   attempt to create directly in closed status
    /// - `DuplicateKey` when the magic number was already used; the store's
    ///   unique constraint settles races, so the first writer always wins
    pub async fn create(&self, input: CreateOperation) -> Result<OperationRecord, LedgerError> {
        input.validate()?;

        let now = Utc::now();
        let open_time = input.open_time.unwrap_or(now);
        let stop_loss_initial = input.stop_loss_initial.unwrap_or(input.stop_loss);
        let take_profit_initial = input.take_profit_initial.unwrap_or(input.take_profit);

        let record = sqlx::query_as::<_, OperationRecord>(
            r#"
            INSERT INTO operations (
                magic_number, bot_id, ia_id, symbol, order_type, direction,
                suggested_price, actual_entry_price, stop_loss, take_profit,
                stop_loss_initial, take_profit_initial, lot_size, risk_percentage,
                status, open_time, conversation_id, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?18)
            RETURNING *
            "#,
        )
        .bind(input.magic_number)
        .bind(input.bot_id)
        .bind(input.ia_id)
        .bind(&input.symbol)
        .bind(input.order_type.as_str())
        .bind(input.direction.as_str())
        .bind(input.suggested_price)
        .bind(input.actual_entry_price)
        .bind(input.stop_loss)
        .bind(input.take_profit)
        .bind(stop_loss_initial)
        .bind(take_profit_initial)
        .bind(input.lot_size)
        .bind(input.risk_percentage)
        .bind(input.status.as_str())
        .bind(open_time)
        .bind(&input.conversation_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Failed to create operation magic={}: {}",
                input.magic_number, e
            );
            LedgerError::from_insert(e, &format!("magic_number={}", input.magic_number))
        })?;

        debug!(
            "Created operation: id={} magic={} {} {} {}",
            record.id, record.magic_number, record.symbol, record.order_type, record.direction
        );
        Ok(record)
    }

    /// Get operation by ID
    pub async fn get(&self, id: i64) -> Result<Option<OperationRecord>, LedgerError> {
        let record = sqlx::query_as::<_, OperationRecord>("SELECT * FROM operations WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to get operation {}: {}", id, e);
                LedgerError::Storage(e)
            })?;

        Ok(record)
    }

    /// Get operation by magic number
    pub async fn get_by_magic_number(
        &self,
        magic_number: i64,
    ) -> Result<Option<OperationRecord>, LedgerError> {
        let record = sqlx::query_as::<_, OperationRecord>(
            "SELECT * FROM operations WHERE magic_number = ?1",
        )
        .bind(magic_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get operation magic={}: {}", magic_number, e);
            LedgerError::Storage(e)
        })?;

        Ok(record)
    }

    /// Get a not-yet-closed operation for a symbol by its magic number
    pub async fn get_open_for_symbol_and_magic(
        &self,
        symbol: &str,
        magic_number: i64,
    ) -> Result<Option<OperationRecord>, LedgerError> {
        let record = sqlx::query_as::<_, OperationRecord>(
            r#"
            SELECT * FROM operations
            WHERE symbol = ?1 AND magic_number = ?2 AND status IN ('pending', 'open')
            "#,
        )
        .bind(symbol)
        .bind(magic_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Failed to get open operation {} magic={}: {}",
                symbol, magic_number, e
            );
            LedgerError::Storage(e)
        })?;

        Ok(record)
    }

    /// List operations, newest first. Filters compose conjunctively.
    pub async fn list(&self, filter: &OperationFilter) -> Result<Vec<OperationRecord>, LedgerError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM operations WHERE 1=1");
        apply_filter(&mut qb, filter);
        qb.push(" ORDER BY open_time DESC, id DESC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }

        let records = qb
            .build_query_as::<OperationRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to list operations: {}", e);
                LedgerError::Storage(e)
            })?;

        Ok(records)
    }

    /// Count operations matching the filter (the limit field is ignored).
    pub async fn count(&self, filter: &OperationFilter) -> Result<i64, LedgerError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM operations WHERE 1=1");
        apply_filter(&mut qb, filter);

        let count = qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to count operations: {}", e);
                LedgerError::Storage(e)
            })?;

        Ok(count)
    }

    /// Apply a partial update. Only the supplied fields change; the
    /// `_initial` risk pair is not expressible here at all.
    ///
    /// Returns `Ok(None)` for an unknown id.
    ///
    /// # Errors
    /// `InvalidTransition` when the operation is already closed, when the
    /// requested status change is not allowed by the lifecycle, or when the
    /// caller tries to reach closed status through an update instead of the
    /// close call.
    pub async fn update(
        &self,
        id: i64,
        update: UpdateOperation,
    ) -> Result<Option<OperationRecord>, LedgerError> {
        let current = match self.get(id).await? {
            Some(record) => record,
            None => return Ok(None),
        };

        let current_status = current.parsed_status()?;
        if current_status.is_terminal() {
            return Err(LedgerError::InvalidTransition(format!(
                "operation {} is closed and can no longer be updated",
                id
            )));
        }
        if let Some(next) = update.status {
            if next.is_terminal() {
                return Err(LedgerError::InvalidTransition(
                    "operations are closed through close(), not a status update".to_string(),
                ));
            }
            if !current_status.can_transition_to(next) {
                return Err(LedgerError::InvalidTransition(format!(
                    "cannot move operation {} from {} to {}",
                    id, current_status, next
                )));
            }
        }

        let now = Utc::now();
        let record = sqlx::query_as::<_, OperationRecord>(
            r#"
            UPDATE operations SET
                actual_entry_price = COALESCE(?1, actual_entry_price),
                stop_loss = COALESCE(?2, stop_loss),
                take_profit = COALESCE(?3, take_profit),
                status = COALESCE(?4, status),
                conversation_id = COALESCE(?5, conversation_id),
                updated_at = ?6
            WHERE id = ?7
            RETURNING *
            "#,
        )
        .bind(update.actual_entry_price)
        .bind(update.stop_loss)
        .bind(update.take_profit)
        .bind(update.status.map(|s| s.as_str()))
        .bind(&update.conversation_id)
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to update operation {}: {}", id, e);
            LedgerError::Storage(e)
        })?;

        if record.is_some() {
            debug!("Updated operation: {}", id);
        }
        Ok(record)
    }

    /// Close an operation: atomically set status, profit_loss and close_time.
    ///
    /// Re-closing with the identical profit_loss is an idempotent no-op.
    ///
    /// # Errors
    /// - `NotFound` for an unknown id
    /// - `InvalidTransition` when closing from pending, or when the
    ///   operation is already closed with a different profit_loss
    pub async fn close(
        &self,
        id: i64,
        profit_loss: f64,
    ) -> Result<OperationRecord, LedgerError> {
        let current = self
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("operation id={}", id)))?;

        match current.parsed_status()? {
            OperationStatus::Closed => {
                if current.profit_loss == Some(profit_loss) {
                    debug!("Operation {} already closed with same profit_loss", id);
                    Ok(current)
                } else {
                    Err(LedgerError::InvalidTransition(format!(
                        "operation {} is already closed with profit_loss {:?}, refusing {}",
                        id, current.profit_loss, profit_loss
                    )))
                }
            }
            OperationStatus::Pending => Err(LedgerError::InvalidTransition(format!(
                "operation {} is pending; only open operations can close",
                id
            ))),
            OperationStatus::Open => {
                let now = Utc::now();
                let record = sqlx::query_as::<_, OperationRecord>(
                    r#"
                    UPDATE operations
                    SET status = 'closed', profit_loss = ?1, close_time = ?2, updated_at = ?2
                    WHERE id = ?3 AND status = 'open'
                    RETURNING *
                    "#,
                )
                .bind(profit_loss)
                .bind(now)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    error!("Failed to close operation {}: {}", id, e);
                    LedgerError::Storage(e)
                })?;

                match record {
                    Some(record) => {
                        debug!("Closed operation: {} profit_loss={}", id, profit_loss);
                        Ok(record)
                    }
                    // Lost a close race since the read above; fall back to
                    // the idempotency rule against the winner's row.
                    None => {
                        let raced = self.get(id).await?.ok_or_else(|| {
                            LedgerError::NotFound(format!("operation id={}", id))
                        })?;
                        if raced.profit_loss == Some(profit_loss) {
                            Ok(raced)
                        } else {
                            Err(LedgerError::InvalidTransition(format!(
                                "operation {} was closed concurrently with profit_loss {:?}",
                                id, raced.profit_loss
                            )))
                        }
                    }
                }
            }
        }
    }
}

fn apply_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &OperationFilter) {
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(symbol) = &filter.symbol {
        qb.push(" AND symbol = ").push_bind(symbol.clone());
    }
    if let Some(bot_id) = filter.bot_id {
        qb.push(" AND bot_id = ").push_bind(bot_id);
    }
    if let Some(order_type) = filter.order_type {
        qb.push(" AND order_type = ").push_bind(order_type.as_str());
    }
}

#[async_trait]
impl OperationSource for OperationRepository {
    async fn closed_operations_on(
        &self,
        bot_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<OperationRecord>, LedgerError> {
        let (start, end) = day_bounds(date);
        let records = sqlx::query_as::<_, OperationRecord>(
            r#"
            SELECT * FROM operations
            WHERE bot_id = ?1 AND status = 'closed'
              AND close_time >= ?2 AND close_time < ?3
            ORDER BY close_time ASC
            "#,
        )
        .bind(bot_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Failed to get closed operations for bot {} on {}: {}",
                bot_id, date, e
            );
            LedgerError::Storage(e)
        })?;

        Ok(records)
    }
}
