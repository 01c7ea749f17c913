use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use arcpay_core::domain::activity::ActivityId;
use arcpay_core::domain::transaction::{Transaction, TransactionId, TransferStatus};

use super::{RepositoryError, TransactionRepository};
use crate::DbPool;

pub struct SqlTransactionRepository {
    pool: DbPool,
}

impl SqlTransactionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let activity_id: String =
        row.try_get("activity_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let tx_hash: String =
        row.try_get("tx_hash").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let explorer_url: String =
        row.try_get("explorer_url").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let amount: String =
        row.try_get("amount").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let currency: String =
        row.try_get("currency").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let recipient: String =
        row.try_get("recipient").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let confirmations: i64 =
        row.try_get("confirmations").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let status = TransferStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown transfer status `{status_str}`")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("created_at: {e}")))?;

    Ok(Transaction {
        id: TransactionId(id),
        activity_id: ActivityId(activity_id),
        tx_hash,
        explorer_url,
        amount: Decimal::from_str(&amount)
            .map_err(|e| RepositoryError::Decode(format!("amount: {e}")))?,
        currency,
        recipient,
        status,
        confirmations: confirmations as u32,
        created_at,
    })
}

#[async_trait::async_trait]
impl TransactionRepository for SqlTransactionRepository {
    async fn insert(&self, transaction: Transaction) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO transactions (id, activity_id, tx_hash, explorer_url, amount,
                                       currency, recipient, status, confirmations, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&transaction.id.0)
        .bind(&transaction.activity_id.0)
        .bind(&transaction.tx_hash)
        .bind(&transaction.explorer_url)
        .bind(transaction.amount.to_string())
        .bind(&transaction.currency)
        .bind(&transaction.recipient)
        .bind(transaction.status.as_str())
        .bind(transaction.confirmations as i64)
        .bind(transaction.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_activity(
        &self,
        activity_id: &ActivityId,
    ) -> Result<Option<Transaction>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, activity_id, tx_hash, explorer_url, amount, currency, recipient,
                    status, confirmations, created_at
             FROM transactions WHERE activity_id = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(&activity_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_transaction(r)?)),
            None => Ok(None),
        }
    }
}
