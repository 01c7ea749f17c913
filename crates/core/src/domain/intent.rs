use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The single currency this service moves.
pub const DEFAULT_CURRENCY: &str = "USDC";

/// Structured transfer request derived from one free-text query. Immutable
/// once produced; the activity record snapshots it for audit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferIntent {
    pub amount: Decimal,
    pub currency: String,
    pub recipient: String,
    #[serde(rename = "recipientName")]
    pub recipient_name: String,
    pub reasoning: String,
}

impl TransferIntent {
    /// Deterministic pseudo-address for intents where the extractor did not
    /// supply one. The same (name, amount) pair always maps to the same
    /// placeholder so repeated queries stay comparable in the audit trail.
    pub fn placeholder_address(recipient_name: &str, amount: Decimal) -> String {
        let digest = Sha256::digest(format!("{recipient_name}{amount}").as_bytes());
        let hex = format!("{digest:x}");
        let head = &hex[..8];
        format!("0x{head}...{}", &head[4..])
    }
}
