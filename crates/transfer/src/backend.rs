use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use arcpay_core::domain::transaction::TransferStatus;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("transfer request failed: {0}")]
    Request(String),
    #[error("transfer response could not be decoded: {0}")]
    Decode(String),
    #[error("transfer rejected by backend: {0}")]
    Rejected(String),
}

/// One transfer attempt as acknowledged by the backend, or synthesized by
/// the executor when the deadline elapsed first (`timed_out = true`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferReceipt {
    pub tx_hash: String,
    pub status: TransferStatus,
    pub amount: Decimal,
    pub recipient: String,
    pub timed_out: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferStatusReport {
    pub tx_hash: String,
    pub status: TransferStatus,
    pub confirmations: u32,
}

#[async_trait]
pub trait TransferBackend: Send + Sync {
    async fn create_transfer(
        &self,
        amount: Decimal,
        recipient: &str,
    ) -> Result<TransferReceipt, BackendError>;

    async fn transfer_status(&self, tx_hash: &str)
        -> Result<TransferStatusReport, BackendError>;
}

/// HTTP client for the sandbox payment API.
pub struct SandboxBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

#[derive(Debug, Serialize)]
struct CreateTransferRequest<'a> {
    amount: String,
    currency: &'a str,
    destination: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateTransferResponse {
    tx_hash: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct TransferStatusResponse {
    tx_hash: String,
    status: String,
    #[serde(default)]
    confirmations: u32,
}

impl SandboxBackend {
    pub fn new(base_url: impl Into<String>, api_key: Option<SecretString>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into(), api_key }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(api_key) => request.bearer_auth(api_key.expose_secret()),
            None => request,
        }
    }

    fn parse_status(raw: &str) -> Result<TransferStatus, BackendError> {
        TransferStatus::parse(raw)
            .ok_or_else(|| BackendError::Decode(format!("unknown transfer status `{raw}`")))
    }
}

#[async_trait]
impl TransferBackend for SandboxBackend {
    async fn create_transfer(
        &self,
        amount: Decimal,
        recipient: &str,
    ) -> Result<TransferReceipt, BackendError> {
        let url = format!("{}/v1/transfers", self.base_url.trim_end_matches('/'));
        let body = CreateTransferRequest {
            amount: amount.to_string(),
            currency: arcpay_core::DEFAULT_CURRENCY,
            destination: recipient,
        };

        let response = self
            .authorized(self.client.post(&url).json(&body))
            .send()
            .await
            .map_err(|error| BackendError::Request(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(BackendError::Rejected(format!("{status}: {detail}")));
        }

        let payload: CreateTransferResponse =
            response.json().await.map_err(|error| BackendError::Decode(error.to_string()))?;

        Ok(TransferReceipt {
            tx_hash: payload.tx_hash,
            status: Self::parse_status(&payload.status)?,
            amount,
            recipient: recipient.to_string(),
            timed_out: false,
        })
    }

    async fn transfer_status(
        &self,
        tx_hash: &str,
    ) -> Result<TransferStatusReport, BackendError> {
        let url = format!("{}/v1/transfers/{tx_hash}", self.base_url.trim_end_matches('/'));

        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|error| BackendError::Request(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(BackendError::Rejected(format!("{status}: {detail}")));
        }

        let payload: TransferStatusResponse =
            response.json().await.map_err(|error| BackendError::Decode(error.to_string()))?;

        Ok(TransferStatusReport {
            tx_hash: payload.tx_hash,
            status: Self::parse_status(&payload.status)?,
            confirmations: payload.confirmations,
        })
    }
}
