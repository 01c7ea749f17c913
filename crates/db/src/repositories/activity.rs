use chrono::{DateTime, Utc};
use sqlx::Row;

use arcpay_core::domain::activity::{Activity, ActivityId, ActivityStatus, PolicyCheck};
use arcpay_core::domain::intent::TransferIntent;

use super::{ActivityRepository, RepositoryError};
use crate::DbPool;

pub struct SqlActivityRepository {
    pool: DbPool,
}

impl SqlActivityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "id, user_query, structured_intent, ai_reasoning, status,
                              policy_checks, locked, locked_at, created_at";

fn parse_status(raw: &str) -> Result<ActivityStatus, RepositoryError> {
    ActivityStatus::parse(raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown activity status `{raw}`")))
}

fn row_to_activity(row: &sqlx::sqlite::SqliteRow) -> Result<Activity, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_query: String =
        row.try_get("user_query").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let structured_intent: String =
        row.try_get("structured_intent").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let ai_reasoning: String =
        row.try_get("ai_reasoning").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let policy_checks: String =
        row.try_get("policy_checks").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let locked: i64 =
        row.try_get("locked").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let locked_at_str: Option<String> =
        row.try_get("locked_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let structured_intent: TransferIntent = serde_json::from_str(&structured_intent)
        .map_err(|e| RepositoryError::Decode(format!("structured_intent: {e}")))?;
    let policy_checks: Vec<PolicyCheck> = serde_json::from_str(&policy_checks)
        .map_err(|e| RepositoryError::Decode(format!("policy_checks: {e}")))?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("created_at: {e}")))?;
    let locked_at = locked_at_str
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(Activity {
        id: ActivityId(id),
        user_query,
        structured_intent,
        ai_reasoning,
        status: parse_status(&status_str)?,
        policy_checks,
        locked: locked != 0,
        locked_at,
        created_at,
    })
}

#[async_trait::async_trait]
impl ActivityRepository for SqlActivityRepository {
    async fn find_by_id(&self, id: &ActivityId) -> Result<Option<Activity>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM activities WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_activity(r)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, activity: Activity) -> Result<(), RepositoryError> {
        let structured_intent = serde_json::to_string(&activity.structured_intent)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let policy_checks = serde_json::to_string(&activity.policy_checks)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO activities (id, user_query, structured_intent, ai_reasoning, status,
                                     policy_checks, locked, locked_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&activity.id.0)
        .bind(&activity.user_query)
        .bind(&structured_intent)
        .bind(&activity.ai_reasoning)
        .bind(activity.status.as_str())
        .bind(&policy_checks)
        .bind(activity.locked as i64)
        .bind(activity.locked_at.map(|dt| dt.to_rfc3339()))
        .bind(activity.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn begin_execution(
        &self,
        id: &ActivityId,
        locked_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        // The WHERE clause is the mutual exclusion: only one of two racing
        // approvals can observe locked = 0, and a concurrent deny cannot be
        // overtaken once the status left the approvable set.
        let result = sqlx::query(
            "UPDATE activities
             SET locked = 1, locked_at = ?, status = 'executing'
             WHERE id = ? AND locked = 0
               AND status IN ('pending_approval', 'flagged_by_policy')",
        )
        .bind(locked_at.to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn finish_execution(
        &self,
        id: &ActivityId,
        status: ActivityStatus,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE activities SET locked = 0, status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_status(
        &self,
        id: &ActivityId,
        status: ActivityStatus,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE activities SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_recent(&self) -> Result<Vec<Activity>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM activities ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_activity).collect::<Result<Vec<_>, _>>()
    }
}
