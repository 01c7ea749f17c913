use std::env;
use std::sync::{Mutex, OnceLock};

use arcpay_cli::commands::{doctor, migrate, seed};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("ARCPAY_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_on_invalid_database_url() {
    with_env(&[("ARCPAY_DATABASE_URL", "postgres://not/sqlite")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_inserts_default_policy() {
    with_env(&[("ARCPAY_DATABASE_URL", "sqlite::memory:")], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected successful seed run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("seeded default spending policy"));
        assert!(message.contains("max_tx_amount=1000"));
    });
}

#[test]
fn seed_output_is_deterministic_across_runs() {
    with_env(&[("ARCPAY_DATABASE_URL", "sqlite::memory:")], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");

        assert_eq!(
            parse_payload(&first.output)["message"],
            parse_payload(&second.output)["message"],
        );
    });
}

#[test]
fn doctor_reports_passing_checks_with_valid_env() {
    with_env(&[("ARCPAY_DATABASE_URL", "sqlite::memory:")], || {
        let output = doctor::run(true);
        let payload: Value =
            serde_json::from_str(&output).expect("doctor --json output should be valid JSON");

        assert_eq!(payload["overall_status"], "pass");
        let checks = payload["checks"].as_array().expect("checks array");
        assert_eq!(checks.len(), 3);
        assert!(checks.iter().all(|check| check["status"] == "pass"));
    });
}

#[test]
fn doctor_reports_failure_when_config_invalid() {
    with_env(&[("ARCPAY_DATABASE_URL", "postgres://not/sqlite")], || {
        let output = doctor::run(true);
        let payload: Value =
            serde_json::from_str(&output).expect("doctor --json output should be valid JSON");

        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["name"], "config_validation");
        assert_eq!(payload["checks"][0]["status"], "fail");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "ARCPAY_DATABASE_URL",
        "ARCPAY_DATABASE_MAX_CONNECTIONS",
        "ARCPAY_DATABASE_TIMEOUT_SECS",
        "ARCPAY_LLM_PROVIDER",
        "ARCPAY_LLM_API_KEY",
        "ARCPAY_LLM_BASE_URL",
        "ARCPAY_LLM_MODEL",
        "ARCPAY_LLM_TIMEOUT_SECS",
        "ARCPAY_LLM_MAX_RETRIES",
        "ARCPAY_TRANSFER_BASE_URL",
        "ARCPAY_TRANSFER_API_KEY",
        "ARCPAY_TRANSFER_TIMEOUT_SECS",
        "ARCPAY_SERVER_BIND_ADDRESS",
        "ARCPAY_SERVER_API_PORT",
        "ARCPAY_SERVER_HEALTH_CHECK_PORT",
        "ARCPAY_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "ARCPAY_LOGGING_LEVEL",
        "ARCPAY_LOGGING_FORMAT",
        "ARCPAY_LOG_LEVEL",
        "ARCPAY_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
