use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use arcpay_core::domain::policy::{Policy, PolicyId};

use super::{PolicyRepository, RepositoryError};
use crate::DbPool;

pub struct SqlPolicyRepository {
    pool: DbPool,
}

impl SqlPolicyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_decimal(raw: &str, column: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(raw)
        .map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

fn decode_list(raw: &str, column: &str) -> Result<Vec<String>, RepositoryError> {
    serde_json::from_str(raw).map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

fn decode_timestamp(raw: &str, column: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

fn row_to_policy(row: &sqlx::sqlite::SqliteRow) -> Result<Policy, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let max_tx_amount: String =
        row.try_get("max_tx_amount").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let monthly_budget: String =
        row.try_get("monthly_budget").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let current_monthly_spent: String = row
        .try_get("current_monthly_spent")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let required_approval_threshold: String = row
        .try_get("required_approval_threshold")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let allow_list: String =
        row.try_get("allow_list").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let block_list: String =
        row.try_get("block_list").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Policy {
        id: PolicyId(id),
        max_tx_amount: decode_decimal(&max_tx_amount, "max_tx_amount")?,
        monthly_budget: decode_decimal(&monthly_budget, "monthly_budget")?,
        current_monthly_spent: decode_decimal(&current_monthly_spent, "current_monthly_spent")?,
        required_approval_threshold: decode_decimal(
            &required_approval_threshold,
            "required_approval_threshold",
        )?,
        allow_list: decode_list(&allow_list, "allow_list")?,
        block_list: decode_list(&block_list, "block_list")?,
        created_at: decode_timestamp(&created_at, "created_at")?,
    })
}

#[async_trait::async_trait]
impl PolicyRepository for SqlPolicyRepository {
    async fn current(&self) -> Result<Option<Policy>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, max_tx_amount, monthly_budget, current_monthly_spent,
                    required_approval_threshold, allow_list, block_list, created_at
             FROM policies ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_policy(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, policy: Policy) -> Result<(), RepositoryError> {
        let allow_list = serde_json::to_string(&policy.allow_list)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let block_list = serde_json::to_string(&policy.block_list)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO policies (id, max_tx_amount, monthly_budget, current_monthly_spent,
                                   required_approval_threshold, allow_list, block_list, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 max_tx_amount = excluded.max_tx_amount,
                 monthly_budget = excluded.monthly_budget,
                 current_monthly_spent = excluded.current_monthly_spent,
                 required_approval_threshold = excluded.required_approval_threshold,
                 allow_list = excluded.allow_list,
                 block_list = excluded.block_list",
        )
        .bind(&policy.id.0)
        .bind(policy.max_tx_amount.to_string())
        .bind(policy.monthly_budget.to_string())
        .bind(policy.current_monthly_spent.to_string())
        .bind(policy.required_approval_threshold.to_string())
        .bind(&allow_list)
        .bind(&block_list)
        .bind(policy.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_spend(
        &self,
        id: &PolicyId,
        new_total: Decimal,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE policies SET current_monthly_spent = ? WHERE id = ?")
            .bind(new_total.to_string())
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
