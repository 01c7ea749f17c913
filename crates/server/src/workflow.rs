//! The activity lifecycle manager: owns the approval/execution protocol.
//!
//! All collaborators are injected trait objects, so the full protocol —
//! including the concurrent-approval race — is exercised in tests against
//! in-memory repositories and scripted backends.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use arcpay_agent::IntentExtractor;
use arcpay_core::domain::activity::{Activity, ActivityId, ActivityStatus};
use arcpay_core::domain::policy::{Policy, PolicyId, PolicyPatch};
use arcpay_core::domain::transaction::{Transaction, TransactionId, TransferStatus};
use arcpay_core::errors::WorkflowError;
use arcpay_core::proof::{explorer_url, proof_data, ProofData};
use arcpay_core::validator::{determine_status, validate, ValidationOutcome};
use arcpay_db::repositories::{
    ActivityRepository, PolicyRepository, RepositoryError, TransactionRepository,
};
use arcpay_transfer::TransferExecutor;

pub struct PaymentWorkflow {
    policies: Arc<dyn PolicyRepository>,
    activities: Arc<dyn ActivityRepository>,
    transactions: Arc<dyn TransactionRepository>,
    extractor: IntentExtractor,
    executor: TransferExecutor,
}

/// Outcome of processing one free-text query.
pub enum IntentOutcome {
    /// The query did not describe a transfer; `message` guides the user.
    NotTransaction { message: String },
    Created(IntentDecision),
}

pub struct IntentDecision {
    pub activity: Activity,
    pub validation: ValidationOutcome,
}

#[derive(Debug, Serialize)]
pub struct ApprovalReceipt {
    pub activity_id: ActivityId,
    pub tx_hash: String,
    pub explorer_url: String,
    pub status: TransferStatus,
    pub proof_data: ProofData,
}

pub struct ActivityRecord {
    pub activity: Activity,
    pub transaction: Option<Transaction>,
}

fn storage_error(error: RepositoryError) -> WorkflowError {
    WorkflowError::Unexpected(error.to_string())
}

impl PaymentWorkflow {
    pub fn new(
        policies: Arc<dyn PolicyRepository>,
        activities: Arc<dyn ActivityRepository>,
        transactions: Arc<dyn TransactionRepository>,
        extractor: IntentExtractor,
        executor: TransferExecutor,
    ) -> Self {
        Self { policies, activities, transactions, extractor, executor }
    }

    /// Turn a query into a validated activity awaiting a human decision.
    pub async fn process_intent(&self, query: &str) -> Result<IntentOutcome, WorkflowError> {
        let policy = self
            .policies
            .current()
            .await
            .map_err(storage_error)?
            .ok_or(WorkflowError::PolicyNotFound)?;

        let intent = self
            .extractor
            .process_query(query, &policy)
            .await
            .map_err(|error| WorkflowError::Unexpected(error.to_string()))?;

        let Some(intent) = intent else {
            return Ok(IntentOutcome::NotTransaction {
                message: "I'd be happy to help! Please specify an amount and recipient. \
                          For example: 'Send $100 to Stripe'"
                    .to_string(),
            });
        };

        let validation = validate(&intent, &policy);
        let activity = Activity {
            id: ActivityId(Uuid::new_v4().to_string()),
            user_query: query.to_string(),
            ai_reasoning: intent.reasoning.clone(),
            structured_intent: intent,
            status: determine_status(validation.is_valid),
            policy_checks: validation.policy_checks.clone(),
            locked: false,
            locked_at: None,
            created_at: Utc::now(),
        };
        self.activities.insert(activity.clone()).await.map_err(storage_error)?;

        info!(
            event_name = "workflow.intent.recorded",
            activity_id = %activity.id.0,
            status = %activity.status,
            is_valid = validation.is_valid,
            "recorded transfer intent"
        );

        Ok(IntentOutcome::Created(IntentDecision { activity, validation }))
    }

    /// Approve and execute an activity. At most one caller gets past the
    /// lock; everything after lock acquisition releases it on every exit
    /// path.
    pub async fn approve(&self, id: &ActivityId) -> Result<ApprovalReceipt, WorkflowError> {
        let activity = self
            .activities
            .find_by_id(id)
            .await
            .map_err(storage_error)?
            .ok_or_else(|| WorkflowError::ActivityNotFound(id.0.clone()))?;

        if activity.locked {
            return Err(WorkflowError::Locked(id.0.clone()));
        }
        if !activity.status.approvable() {
            return Err(WorkflowError::InvalidState { status: activity.status });
        }

        // The conditional update closes the window between the checks above
        // and the lock write: of two racing approvals exactly one observes
        // the unlocked row.
        let acquired =
            self.activities.begin_execution(id, Utc::now()).await.map_err(storage_error)?;
        if !acquired {
            return Err(WorkflowError::Locked(id.0.clone()));
        }

        match self.execute_approved(&activity).await {
            Ok(receipt) => {
                info!(
                    event_name = "workflow.approve.completed",
                    activity_id = %id.0,
                    tx_hash = %receipt.tx_hash,
                    status = %receipt.status,
                    "approval executed"
                );
                Ok(receipt)
            }
            Err(workflow_error) => {
                let outcome_status = match &workflow_error {
                    WorkflowError::PolicyViolation(_) => ActivityStatus::FlaggedByPolicy,
                    _ => ActivityStatus::Failed,
                };
                if let Err(release_error) =
                    self.activities.finish_execution(id, outcome_status).await
                {
                    error!(
                        event_name = "workflow.approve.lock_release_failed",
                        activity_id = %id.0,
                        error = %release_error,
                        "failed to release activity lock after error"
                    );
                }
                Err(workflow_error)
            }
        }
    }

    /// The locked section of the approval path. Callers own lock release.
    async fn execute_approved(
        &self,
        activity: &Activity,
    ) -> Result<ApprovalReceipt, WorkflowError> {
        // The policy may have changed since the activity was created; a
        // stale approval must never execute.
        let policy = self.policies.current().await.map_err(storage_error)?;
        if let Some(policy) = &policy {
            let revalidation = validate(&activity.structured_intent, policy);
            if !revalidation.is_valid {
                let first_violation = revalidation
                    .violations
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| "policy validation failed".to_string());
                return Err(WorkflowError::PolicyViolation(first_violation));
            }
        }

        let intent = &activity.structured_intent;
        let receipt = self
            .executor
            .execute(intent.amount, &intent.recipient)
            .await
            .map_err(|error| WorkflowError::Upstream(error.to_string()))?;

        let transaction = Transaction {
            id: TransactionId(Uuid::new_v4().to_string()),
            activity_id: activity.id.clone(),
            tx_hash: receipt.tx_hash.clone(),
            explorer_url: explorer_url(&receipt.tx_hash),
            amount: intent.amount,
            currency: intent.currency.clone(),
            recipient: intent.recipient.clone(),
            status: receipt.status,
            confirmations: 0,
            created_at: Utc::now(),
        };
        self.transactions.insert(transaction).await.map_err(storage_error)?;

        let final_status = if receipt.status == TransferStatus::Confirmed {
            ActivityStatus::Executed
        } else {
            // Still in flight; reconciliation happens later under the same
            // activity id.
            ActivityStatus::Executing
        };
        self.activities.finish_execution(&activity.id, final_status).await.map_err(storage_error)?;

        // Spend tracks attempted transfers, so this runs only once the
        // transfer call was actually issued. Last write wins across
        // concurrent approvals of different activities (see DESIGN.md).
        if let Some(policy) = policy {
            let new_total = policy.current_monthly_spent + intent.amount;
            self.policies.record_spend(&policy.id, new_total).await.map_err(storage_error)?;
        }

        Ok(ApprovalReceipt {
            activity_id: activity.id.clone(),
            tx_hash: receipt.tx_hash.clone(),
            explorer_url: explorer_url(&receipt.tx_hash),
            status: receipt.status,
            proof_data: proof_data(&receipt.tx_hash, intent.amount, &intent.recipient),
        })
    }

    /// Deny a pending or flagged activity. No lock is taken: denial has no
    /// external side effect.
    pub async fn deny(&self, id: &ActivityId) -> Result<(), WorkflowError> {
        let activity = self
            .activities
            .find_by_id(id)
            .await
            .map_err(storage_error)?
            .ok_or_else(|| WorkflowError::ActivityNotFound(id.0.clone()))?;

        if !activity.status.deniable() {
            return Err(WorkflowError::InvalidState { status: activity.status });
        }

        self.activities
            .set_status(id, ActivityStatus::Rejected)
            .await
            .map_err(storage_error)?;

        info!(
            event_name = "workflow.deny.recorded",
            activity_id = %id.0,
            "activity denied"
        );

        Ok(())
    }

    /// The active policy, seeding the documented default when none exists.
    pub async fn current_policy(&self) -> Result<Policy, WorkflowError> {
        if let Some(policy) = self.policies.current().await.map_err(storage_error)? {
            return Ok(policy);
        }

        let seeded = Policy::seed_default(PolicyId(Uuid::new_v4().to_string()), Utc::now());
        self.policies.save(seeded.clone()).await.map_err(storage_error)?;

        info!(
            event_name = "workflow.policy.seeded",
            policy_id = %seeded.id.0,
            "seeded default policy"
        );

        Ok(seeded)
    }

    pub async fn update_policy(&self, patch: PolicyPatch) -> Result<Policy, WorkflowError> {
        let mut policy = self
            .policies
            .current()
            .await
            .map_err(storage_error)?
            .ok_or(WorkflowError::PolicyNotFound)?;

        policy.apply_patch(patch);
        self.policies.save(policy.clone()).await.map_err(storage_error)?;

        Ok(policy)
    }

    pub async fn list_activities(&self) -> Result<Vec<ActivityRecord>, WorkflowError> {
        let activities = self.activities.list_recent().await.map_err(storage_error)?;

        let mut records = Vec::with_capacity(activities.len());
        for activity in activities {
            let transaction =
                self.transactions.find_by_activity(&activity.id).await.map_err(storage_error)?;
            records.push(ActivityRecord { activity, transaction });
        }

        Ok(records)
    }

    pub async fn get_activity(&self, id: &ActivityId) -> Result<ActivityRecord, WorkflowError> {
        let activity = self
            .activities
            .find_by_id(id)
            .await
            .map_err(storage_error)?
            .ok_or_else(|| WorkflowError::ActivityNotFound(id.0.clone()))?;
        let transaction =
            self.transactions.find_by_activity(&activity.id).await.map_err(storage_error)?;

        Ok(ActivityRecord { activity, transaction })
    }
}
