use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyId(pub String);

/// The active spending policy. Exactly one policy is current at any time:
/// the most recently created row. `current_monthly_spent` only moves forward
/// (administrative resets happen outside this service) and is advanced by the
/// workflow after a transfer attempt was actually issued.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub max_tx_amount: Decimal,
    pub monthly_budget: Decimal,
    pub current_monthly_spent: Decimal,
    pub required_approval_threshold: Decimal,
    pub allow_list: Vec<String>,
    pub block_list: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Policy {
    /// Policy seeded on first read when no policy row exists yet.
    pub fn seed_default(id: PolicyId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            max_tx_amount: Decimal::new(1000, 0),
            monthly_budget: Decimal::new(5000, 0),
            current_monthly_spent: Decimal::ZERO,
            required_approval_threshold: Decimal::new(500, 0),
            allow_list: vec!["Stripe".to_string(), "Circle".to_string(), "Amazon".to_string()],
            block_list: Vec::new(),
            created_at,
        }
    }

    pub fn remaining_budget(&self) -> Decimal {
        self.monthly_budget - self.current_monthly_spent
    }

    /// Overwrite only the fields the patch supplies.
    pub fn apply_patch(&mut self, patch: PolicyPatch) {
        if let Some(max_tx_amount) = patch.max_tx_amount {
            self.max_tx_amount = max_tx_amount;
        }
        if let Some(monthly_budget) = patch.monthly_budget {
            self.monthly_budget = monthly_budget;
        }
        if let Some(allow_list) = patch.allow_list {
            self.allow_list = allow_list;
        }
        if let Some(block_list) = patch.block_list {
            self.block_list = block_list;
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct PolicyPatch {
    pub max_tx_amount: Option<Decimal>,
    pub monthly_budget: Option<Decimal>,
    pub allow_list: Option<Vec<String>>,
    pub block_list: Option<Vec<String>>,
}
