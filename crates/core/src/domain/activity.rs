use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::intent::TransferIntent;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityId(pub String);

/// Lifecycle state of an activity. `Locked` mutual exclusion is a separate
/// flag on the record, not a state: an activity can be `PendingApproval` and
/// briefly locked while a concurrent approval races for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    PendingApproval,
    FlaggedByPolicy,
    Executing,
    Executed,
    Rejected,
    Failed,
}

impl ActivityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingApproval => "pending_approval",
            Self::FlaggedByPolicy => "flagged_by_policy",
            Self::Executing => "executing",
            Self::Executed => "executed",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending_approval" => Some(Self::PendingApproval),
            "flagged_by_policy" => Some(Self::FlaggedByPolicy),
            "executing" => Some(Self::Executing),
            "executed" => Some(Self::Executed),
            "rejected" => Some(Self::Rejected),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn can_transition_to(self, next: ActivityStatus) -> bool {
        matches!(
            (self, next),
            (Self::PendingApproval, Self::Executing)
                | (Self::PendingApproval, Self::Rejected)
                | (Self::FlaggedByPolicy, Self::Executing)
                | (Self::FlaggedByPolicy, Self::Rejected)
                | (Self::Executing, Self::Executing)
                | (Self::Executing, Self::Executed)
                | (Self::Executing, Self::FlaggedByPolicy)
                | (Self::Executing, Self::Failed)
        )
    }

    /// States from which an approval may start the execution path.
    pub fn approvable(self) -> bool {
        self.can_transition_to(Self::Executing)
    }

    /// States from which a human denial is accepted.
    pub fn deniable(self) -> bool {
        self.can_transition_to(Self::Rejected)
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named policy rule evaluation, kept on the activity for audit display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyCheck {
    pub rule: String,
    pub passed: bool,
    pub message: String,
}

/// Full lifecycle record of one user request, from query through (optional)
/// executed transaction. Activities are never deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub user_query: String,
    pub structured_intent: TransferIntent,
    pub ai_reasoning: String,
    pub status: ActivityStatus,
    pub policy_checks: Vec<PolicyCheck>,
    pub locked: bool,
    pub locked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
