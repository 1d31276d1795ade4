//! PostgreSQL queue backend

use crate::error::{QueueError, Result};
use crate::queue::TransactionQueue;
use crate::types::{now, NewTransaction, Operation, StateCounts, TransactionRecord, TxState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Executor, FromRow, PgPool};
use tracing::{debug, info};

const SCHEMA: &str = include_str!("../migrations/0001_create_transactions.sql");

const COLUMNS: &str = "id, external_id, state, sending_at, sent_at, destination, amount, hash";

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: i64,
    external_id: String,
    state: String,
    sending_at: Option<DateTime<Utc>>,
    sent_at: Option<DateTime<Utc>>,
    destination: String,
    amount: String,
    hash: Option<String>,
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = QueueError;

    fn try_from(row: TransactionRow) -> Result<Self> {
        Ok(TransactionRecord {
            id: row.id,
            external_id: row.external_id,
            state: row.state.parse()?,
            sending_at: row.sending_at,
            sent_at: row.sent_at,
            destination: row.destination,
            amount: row.amount,
            hash: row.hash,
        })
    }
}

fn into_records(rows: Vec<TransactionRow>) -> Result<Vec<TransactionRecord>> {
    rows.into_iter().map(TransactionRecord::try_from).collect()
}

/// [`TransactionQueue`] backed by the `transactions` table
#[derive(Debug, Clone)]
pub struct PgQueue {
    pool: PgPool,
}

impl PgQueue {
    /// Wrap an existing connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` with at most `max_connections` connections
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the table and indexes if they do not exist
    pub async fn ensure_schema(&self) -> Result<()> {
        self.pool.execute(SCHEMA).await?;
        info!("Transaction queue schema ready");
        Ok(())
    }

    /// Guarded single-row update. When no row matched, re-reads the row to report why.
    async fn guarded_update(&self, id: i64, op: Operation, rows_affected: u64) -> Result<()> {
        if rows_affected == 1 {
            return Ok(());
        }

        let current = self.get(id).await?;
        op.check(&current)?;
        Err(QueueError::InvariantViolation(format!(
            "{} matched no row for transaction {} in state {}",
            op.as_str(),
            id,
            current.state
        )))
    }
}

#[async_trait]
impl TransactionQueue for PgQueue {
    async fn enqueue(&self, tx: NewTransaction) -> Result<i64> {
        let (id,) = sqlx::query_as::<_, (i64,)>(
            r#"
            INSERT INTO transactions (external_id, destination, amount)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&tx.external_id)
        .bind(&tx.destination)
        .bind(&tx.amount)
        .fetch_one(&self.pool)
        .await?;

        debug!("Enqueued transaction {} ({})", id, tx.external_id);
        Ok(id)
    }

    async fn claim_pending(&self, limit: usize) -> Result<Vec<TransactionRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut db_tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            SELECT {}
            FROM transactions
            WHERE state = 'pending'
            ORDER BY id
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
            COLUMNS
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&mut *db_tx)
        .await?;

        let mut records = into_records(rows)?;
        if records.is_empty() {
            db_tx.commit().await?;
            return Ok(records);
        }

        // Dropping the transaction rolls it back
        if let Some(row) = records.iter().find(|r| r.state != TxState::Pending) {
            return Err(QueueError::InvariantViolation(format!(
                "claimed transaction {} is {}",
                row.id, row.state
            )));
        }

        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        let claimed_at = now();
        let updated = sqlx::query(
            r#"
            UPDATE transactions
            SET state = 'sending', sending_at = $1
            WHERE id = ANY($2) AND state = 'pending'
            "#,
        )
        .bind(claimed_at)
        .bind(&ids)
        .execute(&mut *db_tx)
        .await?;

        if updated.rows_affected() != ids.len() as u64 {
            return Err(QueueError::InvariantViolation(format!(
                "claimed {} rows but updated {}",
                ids.len(),
                updated.rows_affected()
            )));
        }

        db_tx.commit().await?;

        for record in &mut records {
            record.state = TxState::Sending;
            record.sending_at = Some(claimed_at);
        }
        debug!("Claimed {} pending transactions", records.len());
        Ok(records)
    }

    async fn record_hash(&self, id: i64, hash: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET hash = $2
            WHERE id = $1 AND state = 'sending' AND hash IS NULL
            "#,
        )
        .bind(id)
        .bind(hash)
        .execute(&self.pool)
        .await?;

        self.guarded_update(id, Operation::RecordHash, result.rows_affected())
            .await
    }

    async fn finalize_success(&self, id: i64) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET state = 'sent', sent_at = $2
            WHERE id = $1 AND state = 'sending' AND hash IS NOT NULL
            "#,
        )
        .bind(id)
        .bind(now())
        .execute(&self.pool)
        .await?;

        self.guarded_update(id, Operation::FinalizeSuccess, result.rows_affected())
            .await
    }

    async fn finalize_error(&self, id: i64) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET state = 'error'
            WHERE id = $1 AND state = 'sending' AND hash IS NOT NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.guarded_update(id, Operation::FinalizeError, result.rows_affected())
            .await
    }

    async fn get(&self, id: i64) -> Result<TransactionRecord> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE id = $1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(QueueError::NotFound(id))?;

        row.try_into()
    }

    async fn count_by_state(&self) -> Result<StateCounts> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT state, COUNT(*) FROM transactions GROUP BY state",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = StateCounts::default();
        for (state, count) in rows {
            counts.add(state.parse()?, count);
        }
        Ok(counts)
    }

    async fn list_sending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<TransactionRecord>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            SELECT {}
            FROM transactions
            WHERE state = 'sending' AND sending_at < $1
            ORDER BY id
            "#,
            COLUMNS
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        into_records(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_conversion_rejects_unknown_state() {
        let row = TransactionRow {
            id: 7,
            external_id: "ext-7".to_string(),
            state: "queued".to_string(),
            sending_at: None,
            sent_at: None,
            destination: "ACCT_B".to_string(),
            amount: "1".to_string(),
            hash: None,
        };
        assert!(matches!(
            TransactionRecord::try_from(row),
            Err(QueueError::UnknownState(s)) if s == "queued"
        ));
    }

    #[test]
    fn test_schema_declares_all_states() {
        for state in ["pending", "sending", "sent", "error"] {
            assert!(SCHEMA.contains(&format!("'{}'", state)));
        }
        assert!(SCHEMA.contains("CREATE TABLE IF NOT EXISTS transactions"));
    }
}
