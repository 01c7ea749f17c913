//! Receipt formatting for completed transfers. Pure string/struct assembly,
//! no I/O.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::intent::DEFAULT_CURRENCY;

const EXPLORER_BASE_URL: &str = "https://arc-explorer.com/tx";

pub fn explorer_url(tx_hash: &str) -> String {
    format!("{EXPLORER_BASE_URL}/{tx_hash}")
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub id: &'static str,
    pub label: &'static str,
    pub status: &'static str,
}

/// The receipt returned to the caller after execution: hash, explorer link,
/// and the three-step checklist rendered by clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProofData {
    pub tx_hash: String,
    pub explorer_url: String,
    pub amount: Decimal,
    pub currency: String,
    pub recipient: String,
    pub status: String,
    pub confirmations: u32,
    pub steps: Vec<ProofStep>,
}

pub fn proof_data(tx_hash: &str, amount: Decimal, recipient: &str) -> ProofData {
    ProofData {
        tx_hash: tx_hash.to_string(),
        explorer_url: explorer_url(tx_hash),
        amount,
        currency: DEFAULT_CURRENCY.to_string(),
        recipient: recipient.to_string(),
        status: "confirmed".to_string(),
        confirmations: 12,
        steps: vec![
            ProofStep { id: "validate", label: "Validating Policy", status: "completed" },
            ProofStep { id: "transfer", label: "Moving USDC", status: "completed" },
            ProofStep { id: "confirm", label: "Confirming on Arc", status: "completed" },
        ],
    }
}
