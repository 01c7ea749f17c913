//! In-memory repository implementations used by workflow and interface
//! tests. The activity lock is a single critical section under the write
//! guard, mirroring the conditional update the SQL implementation performs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use arcpay_core::domain::activity::{Activity, ActivityId, ActivityStatus};
use arcpay_core::domain::policy::{Policy, PolicyId};
use arcpay_core::domain::transaction::Transaction;

use super::{
    ActivityRepository, PolicyRepository, RepositoryError, TransactionRepository,
};

#[derive(Default)]
pub struct InMemoryPolicyRepository {
    policies: RwLock<Vec<Policy>>,
}

#[async_trait::async_trait]
impl PolicyRepository for InMemoryPolicyRepository {
    async fn current(&self) -> Result<Option<Policy>, RepositoryError> {
        let policies = self.policies.read().await;
        Ok(policies.iter().max_by_key(|policy| policy.created_at).cloned())
    }

    async fn save(&self, policy: Policy) -> Result<(), RepositoryError> {
        let mut policies = self.policies.write().await;
        if let Some(existing) = policies.iter_mut().find(|p| p.id == policy.id) {
            *existing = policy;
        } else {
            policies.push(policy);
        }
        Ok(())
    }

    async fn record_spend(
        &self,
        id: &PolicyId,
        new_total: Decimal,
    ) -> Result<(), RepositoryError> {
        let mut policies = self.policies.write().await;
        if let Some(policy) = policies.iter_mut().find(|p| &p.id == id) {
            policy.current_monthly_spent = new_total;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryActivityRepository {
    activities: RwLock<HashMap<String, Activity>>,
}

#[async_trait::async_trait]
impl ActivityRepository for InMemoryActivityRepository {
    async fn find_by_id(&self, id: &ActivityId) -> Result<Option<Activity>, RepositoryError> {
        let activities = self.activities.read().await;
        Ok(activities.get(&id.0).cloned())
    }

    async fn insert(&self, activity: Activity) -> Result<(), RepositoryError> {
        let mut activities = self.activities.write().await;
        activities.insert(activity.id.0.clone(), activity);
        Ok(())
    }

    async fn begin_execution(
        &self,
        id: &ActivityId,
        locked_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut activities = self.activities.write().await;
        let Some(activity) = activities.get_mut(&id.0) else {
            return Ok(false);
        };
        if activity.locked || !activity.status.approvable() {
            return Ok(false);
        }
        activity.locked = true;
        activity.locked_at = Some(locked_at);
        activity.status = ActivityStatus::Executing;
        Ok(true)
    }

    async fn finish_execution(
        &self,
        id: &ActivityId,
        status: ActivityStatus,
    ) -> Result<(), RepositoryError> {
        let mut activities = self.activities.write().await;
        if let Some(activity) = activities.get_mut(&id.0) {
            activity.locked = false;
            activity.status = status;
        }
        Ok(())
    }

    async fn set_status(
        &self,
        id: &ActivityId,
        status: ActivityStatus,
    ) -> Result<(), RepositoryError> {
        let mut activities = self.activities.write().await;
        if let Some(activity) = activities.get_mut(&id.0) {
            activity.status = status;
        }
        Ok(())
    }

    async fn list_recent(&self) -> Result<Vec<Activity>, RepositoryError> {
        let activities = self.activities.read().await;
        let mut listed: Vec<Activity> = activities.values().cloned().collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.0.cmp(&a.id.0)));
        Ok(listed)
    }
}

#[derive(Default)]
pub struct InMemoryTransactionRepository {
    transactions: RwLock<HashMap<String, Transaction>>,
}

impl InMemoryTransactionRepository {
    pub async fn count(&self) -> usize {
        self.transactions.read().await.len()
    }
}

#[async_trait::async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn insert(&self, transaction: Transaction) -> Result<(), RepositoryError> {
        let mut transactions = self.transactions.write().await;
        if transactions.contains_key(&transaction.id.0) {
            return Err(RepositoryError::Decode(format!(
                "duplicate transaction id {}",
                transaction.id.0
            )));
        }
        transactions.insert(transaction.id.0.clone(), transaction);
        Ok(())
    }

    async fn find_by_activity(
        &self,
        activity_id: &ActivityId,
    ) -> Result<Option<Transaction>, RepositoryError> {
        let transactions = self.transactions.read().await;
        Ok(transactions.values().find(|tx| &tx.activity_id == activity_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use arcpay_core::domain::activity::{Activity, ActivityId, ActivityStatus};
    use arcpay_core::domain::intent::TransferIntent;
    use arcpay_core::domain::policy::{Policy, PolicyId};

    use crate::repositories::{
        ActivityRepository, InMemoryActivityRepository, InMemoryPolicyRepository,
        PolicyRepository,
    };

    fn sample_activity(id: &str, status: ActivityStatus) -> Activity {
        Activity {
            id: ActivityId(id.to_string()),
            user_query: "Send $50 to Stripe".to_string(),
            structured_intent: TransferIntent {
                amount: Decimal::new(50, 0),
                currency: "USDC".to_string(),
                recipient: "0xabcd1234...1234".to_string(),
                recipient_name: "Stripe".to_string(),
                reasoning: String::new(),
            },
            ai_reasoning: String::new(),
            status,
            policy_checks: Vec::new(),
            locked: false,
            locked_at: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn in_memory_policy_repo_tracks_newest_policy() {
        let repo = InMemoryPolicyRepository::default();

        let older = Policy::seed_default(
            PolicyId("pol-old".to_string()),
            Utc::now() - chrono::Duration::hours(1),
        );
        let newer = Policy::seed_default(PolicyId("pol-new".to_string()), Utc::now());

        repo.save(older).await.expect("save older");
        repo.save(newer).await.expect("save newer");

        let current = repo.current().await.expect("read").expect("exists");
        assert_eq!(current.id.0, "pol-new");
    }

    #[tokio::test]
    async fn begin_execution_is_first_winner_only() {
        let repo = InMemoryActivityRepository::default();
        repo.insert(sample_activity("act-1", ActivityStatus::PendingApproval))
            .await
            .expect("insert");

        let id = ActivityId("act-1".to_string());
        assert!(repo.begin_execution(&id, Utc::now()).await.expect("first"));
        assert!(!repo.begin_execution(&id, Utc::now()).await.expect("second"));

        let activity = repo.find_by_id(&id).await.expect("find").expect("exists");
        assert!(activity.locked);
        assert_eq!(activity.status, ActivityStatus::Executing);
    }

    #[tokio::test]
    async fn begin_execution_rejects_missing_or_terminal_activities() {
        let repo = InMemoryActivityRepository::default();
        repo.insert(sample_activity("act-done", ActivityStatus::Executed))
            .await
            .expect("insert");

        assert!(!repo
            .begin_execution(&ActivityId("act-missing".to_string()), Utc::now())
            .await
            .expect("missing"));
        assert!(!repo
            .begin_execution(&ActivityId("act-done".to_string()), Utc::now())
            .await
            .expect("terminal"));
    }
}
