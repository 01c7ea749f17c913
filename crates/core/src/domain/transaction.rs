use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::activity::ActivityId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

/// Settlement state as reported (or assumed) for a transfer attempt.
/// `PendingOnChain` covers both a backend-acknowledged in-flight transfer and
/// the ambiguous outcome after a timeout where funds may already be committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    PendingOnChain,
    Confirmed,
}

impl TransferStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingOnChain => "pending_on_chain",
            Self::Confirmed => "confirmed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending_on_chain" => Some(Self::PendingOnChain),
            "confirmed" => Some(Self::Confirmed),
            _ => None,
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of one execution attempt. At most one per activity; immutable once
/// written except for confirmation-count advancement by an external poller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub activity_id: ActivityId,
    pub tx_hash: String,
    pub explorer_url: String,
    pub amount: Decimal,
    pub currency: String,
    pub recipient: String,
    pub status: TransferStatus,
    pub confirmations: u32,
    pub created_at: DateTime<Utc>,
}
