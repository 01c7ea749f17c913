use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use arcpay_core::domain::activity::{Activity, ActivityId, ActivityStatus};
use arcpay_core::domain::policy::{Policy, PolicyId};
use arcpay_core::domain::transaction::Transaction;

pub mod activity;
pub mod memory;
pub mod policy;
pub mod transaction;

pub use activity::SqlActivityRepository;
pub use memory::{
    InMemoryActivityRepository, InMemoryPolicyRepository, InMemoryTransactionRepository,
};
pub use policy::SqlPolicyRepository;
pub use transaction::SqlTransactionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait PolicyRepository: Send + Sync {
    /// The currently active policy: the most recently created row.
    async fn current(&self) -> Result<Option<Policy>, RepositoryError>;

    async fn save(&self, policy: Policy) -> Result<(), RepositoryError>;

    /// Overwrite the running monthly spend with a workflow-computed total.
    /// Deliberately last-write-wins: concurrent approvals against different
    /// activities race on this column (see DESIGN.md).
    async fn record_spend(
        &self,
        id: &PolicyId,
        new_total: Decimal,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn find_by_id(&self, id: &ActivityId) -> Result<Option<Activity>, RepositoryError>;

    async fn insert(&self, activity: Activity) -> Result<(), RepositoryError>;

    /// Atomic check-and-set of the execution lock: succeeds (returns true)
    /// only if the activity was unlocked and still approvable, in which case
    /// it is now locked with status `executing`. A plain read-then-write is
    /// not enough here — two concurrent approvals must not both pass.
    async fn begin_execution(
        &self,
        id: &ActivityId,
        locked_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Release the execution lock and record the outcome status.
    async fn finish_execution(
        &self,
        id: &ActivityId,
        status: ActivityStatus,
    ) -> Result<(), RepositoryError>;

    async fn set_status(
        &self,
        id: &ActivityId,
        status: ActivityStatus,
    ) -> Result<(), RepositoryError>;

    /// All activities, newest first.
    async fn list_recent(&self) -> Result<Vec<Activity>, RepositoryError>;
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn insert(&self, transaction: Transaction) -> Result<(), RepositoryError>;

    async fn find_by_activity(
        &self,
        activity_id: &ActivityId,
    ) -> Result<Option<Transaction>, RepositoryError>;
}
