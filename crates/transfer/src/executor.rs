use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tracing::warn;

use arcpay_core::domain::transaction::TransferStatus;

use crate::backend::{BackendError, TransferBackend, TransferReceipt};

/// Runs transfers against the backend under a hard deadline.
pub struct TransferExecutor {
    backend: Arc<dyn TransferBackend>,
    timeout: Duration,
}

impl TransferExecutor {
    pub fn new(backend: Arc<dyn TransferBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Execute a transfer, racing the backend against the deadline.
    ///
    /// A deadline miss is an ambiguous outcome, not a failure: the request
    /// may have reached the backend and funds may already be moving, so the
    /// caller gets a provisional `pending_on_chain` receipt with a freshly
    /// derived hash and `timed_out = true`. Hard backend errors (the request
    /// was rejected or never accepted) do propagate.
    pub async fn execute(
        &self,
        amount: Decimal,
        recipient: &str,
    ) -> Result<TransferReceipt, BackendError> {
        match tokio::time::timeout(self.timeout, self.backend.create_transfer(amount, recipient))
            .await
        {
            Ok(result) => result,
            Err(_elapsed) => {
                let tx_hash = provisional_tx_hash(amount, recipient);
                warn!(
                    event_name = "transfer.deadline_elapsed",
                    tx_hash = %tx_hash,
                    recipient = %recipient,
                    timeout_secs = self.timeout.as_secs(),
                    "transfer deadline elapsed; recording provisional pending receipt"
                );

                Ok(TransferReceipt {
                    tx_hash,
                    status: TransferStatus::PendingOnChain,
                    amount,
                    recipient: recipient.to_string(),
                    timed_out: true,
                })
            }
        }
    }
}

/// Hash standing in for the on-chain transaction id until the confirmation
/// poller reconciles the real one. Salted with the clock so two attempts for
/// the same intent stay distinguishable.
fn provisional_tx_hash(amount: Decimal, recipient: &str) -> String {
    let nonce = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let digest = Sha256::digest(format!("{amount}{recipient}{nonce}").as_bytes());
    format!("0x{digest:x}")
}
