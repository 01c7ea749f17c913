//! Spending-policy validation.
//!
//! Pure rule evaluation: an intent and a policy in, a verdict with the
//! per-rule audit trail out. Rules run in a fixed order and that order is
//! part of the contract — it determines the order of `policy_checks` and of
//! `violations` shown to the user.

use serde::{Deserialize, Serialize};

use crate::domain::activity::{ActivityStatus, PolicyCheck};
use crate::domain::intent::TransferIntent;
use crate::domain::policy::Policy;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub violations: Vec<String>,
    pub policy_checks: Vec<PolicyCheck>,
}

pub fn validate(intent: &TransferIntent, policy: &Policy) -> ValidationOutcome {
    let mut violations = Vec::new();
    let mut policy_checks = Vec::new();

    let amount = intent.amount;
    let recipient_name = intent.recipient_name.as_str();

    let max_tx_passed = amount <= policy.max_tx_amount;
    policy_checks.push(PolicyCheck {
        rule: "Max Transaction Limit".to_string(),
        passed: max_tx_passed,
        message: format!(
            "${amount} {} ${}",
            if max_tx_passed { "≤" } else { ">" },
            policy.max_tx_amount
        ),
    });
    if !max_tx_passed {
        violations.push(format!(
            "Amount ${amount} exceeds max transaction limit of ${}",
            policy.max_tx_amount
        ));
    }

    let remaining = policy.remaining_budget();
    let monthly_passed = policy.current_monthly_spent + amount <= policy.monthly_budget;
    policy_checks.push(PolicyCheck {
        rule: "Monthly Budget".to_string(),
        passed: monthly_passed,
        message: if monthly_passed {
            format!("Remaining: ${remaining:.2}")
        } else {
            format!(
                "Would exceed by ${:.2}",
                policy.current_monthly_spent + amount - policy.monthly_budget
            )
        },
    });
    if !monthly_passed {
        violations.push(format!("Would exceed monthly limit. Remaining: ${remaining:.2}"));
    }

    // The vendor check is advisory: a miss is recorded for the audit trail
    // but does not block on its own. An empty allow list emits no check at
    // all. The block list is the blocking counterpart and only appears when
    // the recipient matched an entry.
    if !policy.allow_list.is_empty() {
        let on_allow_list = list_matches(&policy.allow_list, recipient_name);
        policy_checks.push(PolicyCheck {
            rule: "Approved Vendor".to_string(),
            passed: on_allow_list,
            message: format!(
                "{recipient_name} is {} approved list",
                if on_allow_list { "on" } else { "not on" }
            ),
        });
    }

    if list_matches(&policy.block_list, recipient_name) {
        policy_checks.push(PolicyCheck {
            rule: "Block List".to_string(),
            passed: false,
            message: format!("{recipient_name} is on the block list"),
        });
        violations.push(format!("Recipient {recipient_name} is on the block list"));
    }

    ValidationOutcome { is_valid: violations.is_empty(), violations, policy_checks }
}

/// Case-insensitive containment match against a vendor list.
fn list_matches(entries: &[String], recipient_name: &str) -> bool {
    if recipient_name.is_empty() {
        return false;
    }
    let haystack = recipient_name.to_lowercase();
    entries.iter().any(|entry| haystack.contains(&entry.to_lowercase()))
}

pub fn determine_status(is_valid: bool) -> ActivityStatus {
    if is_valid {
        ActivityStatus::PendingApproval
    } else {
        ActivityStatus::FlaggedByPolicy
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::domain::activity::ActivityStatus;
    use crate::domain::intent::TransferIntent;
    use crate::domain::policy::{Policy, PolicyId};

    use super::{determine_status, validate};

    fn policy() -> Policy {
        Policy {
            id: PolicyId("pol-1".to_string()),
            max_tx_amount: Decimal::new(1000, 0),
            monthly_budget: Decimal::new(5000, 0),
            current_monthly_spent: Decimal::ZERO,
            required_approval_threshold: Decimal::new(500, 0),
            allow_list: vec!["Stripe".to_string()],
            block_list: Vec::new(),
            created_at: Utc::now(),
        }
    }

    fn intent(amount: i64, recipient_name: &str) -> TransferIntent {
        TransferIntent {
            amount: Decimal::new(amount, 0),
            currency: "USDC".to_string(),
            recipient: "0xabcd1234...1234".to_string(),
            recipient_name: recipient_name.to_string(),
            reasoning: String::new(),
        }
    }

    #[test]
    fn approves_small_payment_to_listed_vendor() {
        let outcome = validate(&intent(50, "Stripe"), &policy());

        assert!(outcome.is_valid);
        assert!(outcome.violations.is_empty());
        assert_eq!(determine_status(outcome.is_valid), ActivityStatus::PendingApproval);
    }

    #[test]
    fn flags_amount_above_transaction_limit() {
        let outcome = validate(&intent(1500, "dev"), &policy());

        assert!(!outcome.is_valid);
        assert!(outcome.violations[0].contains("1500"));
        assert!(outcome.violations[0].contains("1000"));
        let check = &outcome.policy_checks[0];
        assert_eq!(check.rule, "Max Transaction Limit");
        assert!(!check.passed);
        assert_eq!(determine_status(outcome.is_valid), ActivityStatus::FlaggedByPolicy);
    }

    #[test]
    fn reports_checks_in_rule_order() {
        let mut policy = policy();
        policy.block_list = vec!["dev".to_string()];
        let outcome = validate(&intent(1500, "dev"), &policy);

        let rules: Vec<&str> = outcome.policy_checks.iter().map(|c| c.rule.as_str()).collect();
        assert_eq!(
            rules,
            vec!["Max Transaction Limit", "Monthly Budget", "Approved Vendor", "Block List"]
        );
        assert!(outcome.violations[0].contains("max transaction limit"));
        assert!(outcome.violations[1].contains("block list"));
    }

    #[test]
    fn monthly_budget_reports_headroom_and_overage() {
        let mut policy = policy();
        policy.current_monthly_spent = Decimal::new(4800, 0);

        let within = validate(&intent(100, "Stripe"), &policy);
        assert!(within.is_valid);
        assert_eq!(within.policy_checks[1].message, "Remaining: $200.00");

        let over = validate(&intent(300, "Stripe"), &policy);
        assert!(!over.is_valid);
        assert_eq!(over.policy_checks[1].message, "Would exceed by $100.00");
        assert!(over.violations[0].contains("Remaining: $200.00"));
    }

    #[test]
    fn allow_list_miss_is_recorded_but_not_blocking() {
        let outcome = validate(&intent(50, "Unknown Vendor"), &policy());

        assert!(outcome.is_valid, "vendor miss alone must not invalidate");
        let vendor_check = outcome
            .policy_checks
            .iter()
            .find(|check| check.rule == "Approved Vendor")
            .expect("vendor check present");
        assert!(!vendor_check.passed);
        assert!(vendor_check.message.contains("not on"));
    }

    #[test]
    fn empty_allow_list_emits_no_vendor_check() {
        let mut policy = policy();
        policy.allow_list.clear();
        let outcome = validate(&intent(50, "Anyone"), &policy);

        assert!(outcome.is_valid);
        assert!(outcome.policy_checks.iter().all(|check| check.rule != "Approved Vendor"));
    }

    #[test]
    fn block_list_always_invalidates() {
        let mut policy = policy();
        policy.allow_list = vec!["Shady".to_string()];
        policy.block_list = vec!["Shady".to_string()];
        let outcome = validate(&intent(10, "Shady"), &policy);

        assert!(!outcome.is_valid, "block list wins even when every other rule passes");
        let block_check = outcome.policy_checks.last().expect("block check present");
        assert_eq!(block_check.rule, "Block List");
        assert!(!block_check.passed);
        assert_eq!(outcome.violations, vec!["Recipient Shady is on the block list"]);
    }

    #[test]
    fn vendor_match_is_case_insensitive_containment() {
        let outcome = validate(&intent(50, "stripe payments inc"), &policy());

        let vendor_check = outcome
            .policy_checks
            .iter()
            .find(|check| check.rule == "Approved Vendor")
            .expect("vendor check present");
        assert!(vendor_check.passed);
    }
}
