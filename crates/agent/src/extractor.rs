use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Deserialize;

use arcpay_core::domain::intent::{TransferIntent, DEFAULT_CURRENCY};
use arcpay_core::domain::policy::Policy;

use crate::llm::LlmClient;

/// Turns a free-text query into a structured transfer intent using the
/// injected language model, with a deterministic pattern parser as the
/// degraded path.
pub struct IntentExtractor {
    client: Arc<dyn LlmClient>,
}

enum Extraction {
    Unparseable,
    NotTransaction,
    Transfer(TransferIntent),
}

impl IntentExtractor {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    /// `Ok(None)` means the query is not a transaction request — a normal
    /// outcome, distinct from a validation failure downstream.
    pub async fn process_query(
        &self,
        query: &str,
        policy: &Policy,
    ) -> Result<Option<TransferIntent>> {
        let prompt = build_prompt(query, policy);

        let completion = match self.client.complete(&prompt).await {
            Ok(completion) => completion,
            Err(_) => return Ok(fallback_parse(query)),
        };

        match parse_completion(&completion) {
            Extraction::Transfer(intent) => Ok(Some(intent)),
            Extraction::NotTransaction => Ok(None),
            Extraction::Unparseable => Ok(fallback_parse(query)),
        }
    }
}

fn build_prompt(query: &str, policy: &Policy) -> String {
    format!(
        "You are a financial assistant analyzing transaction requests.\n\
         \n\
         Current Policy Limits:\n\
         - Max Transaction: ${}\n\
         - Monthly Budget: ${}\n\
         - Current Monthly Spent: ${}\n\
         - Approved Vendors: {}\n\
         \n\
         User Query: \"{query}\"\n\
         \n\
         Extract the following information in JSON format:\n\
         1. amount: The transaction amount (number, no currency symbol)\n\
         2. currency: The currency (default: \"{DEFAULT_CURRENCY}\")\n\
         3. recipient: The destination address, if the query names one\n\
         4. recipientName: The vendor or merchant name (e.g., \"Stripe\", \"Circle\")\n\
         5. reasoning: A brief explanation of why this transaction is or is not \
         safe given the policy limits\n\
         \n\
         If the query is not a transaction request, return null for amount.\n\
         Respond ONLY with valid JSON, no additional text.",
        policy.max_tx_amount,
        policy.monthly_budget,
        policy.current_monthly_spent,
        policy.allow_list.join(", "),
    )
}

#[derive(Debug, Deserialize)]
struct RawIntent {
    amount: Option<Decimal>,
    currency: Option<String>,
    recipient: Option<String>,
    #[serde(alias = "recipientName")]
    recipient_name: Option<String>,
    reasoning: Option<String>,
}

fn parse_completion(completion: &str) -> Extraction {
    // Models wrap the payload in prose or code fences often enough that we
    // cut from the first `{` to the last `}` before deserializing.
    let start = match completion.find('{') {
        Some(start) => start,
        None => return Extraction::Unparseable,
    };
    let end = match completion.rfind('}') {
        Some(end) if end >= start => end,
        _ => return Extraction::Unparseable,
    };

    let raw: RawIntent = match serde_json::from_str(&completion[start..=end]) {
        Ok(raw) => raw,
        Err(_) => return Extraction::Unparseable,
    };

    let amount = match raw.amount {
        Some(amount) if amount > Decimal::ZERO => amount,
        _ => return Extraction::NotTransaction,
    };

    let recipient_name = raw.recipient_name.unwrap_or_default();
    let recipient = raw
        .recipient
        .filter(|address| !address.trim().is_empty())
        .unwrap_or_else(|| TransferIntent::placeholder_address(&recipient_name, amount));

    Extraction::Transfer(TransferIntent {
        amount,
        currency: raw.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        recipient,
        recipient_name,
        reasoning: raw.reasoning.unwrap_or_default(),
    })
}

/// Degraded extraction: a dollar amount plus a `to <name>` token. Anything
/// less is treated as non-transactional.
fn fallback_parse(query: &str) -> Option<TransferIntent> {
    let amount = find_amount(query)?;
    let recipient_name = find_recipient(query)?;

    let reasoning = format!(
        "Detected payment of ${amount} to {recipient_name}. Please review the \
         transaction details and policy limits before approving."
    );

    Some(TransferIntent {
        amount,
        currency: DEFAULT_CURRENCY.to_string(),
        recipient: TransferIntent::placeholder_address(&recipient_name, amount),
        recipient_name,
        reasoning,
    })
}

fn find_amount(query: &str) -> Option<Decimal> {
    query.split_whitespace().find_map(|token| {
        let trimmed = token
            .trim_start_matches('$')
            .trim_matches(|ch: char| !ch.is_ascii_digit() && ch != '.');
        if trimmed.is_empty() || !trimmed.chars().next().is_some_and(|ch| ch.is_ascii_digit()) {
            return None;
        }
        Decimal::from_str(trimmed).ok().filter(|amount| *amount > Decimal::ZERO)
    })
}

fn find_recipient(query: &str) -> Option<String> {
    let mut tokens = query.split_whitespace();
    while let Some(token) = tokens.next() {
        if token.eq_ignore_ascii_case("to") {
            let name: String = tokens
                .next()?
                .chars()
                .filter(|ch| ch.is_ascii_alphanumeric())
                .collect();
            return (!name.is_empty()).then_some(name);
        }
    }
    None
}
