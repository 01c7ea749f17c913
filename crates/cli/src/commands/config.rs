use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use arcpay_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    let mut push_line = |key_path: &str, value: String, env_key: &str| {
        lines.push(render_line(
            key_path,
            &value,
            field_source(
                key_path,
                Some(env_key),
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        ));
    };

    push_line("database.url", config.database.url.clone(), "ARCPAY_DATABASE_URL");
    push_line(
        "database.max_connections",
        config.database.max_connections.to_string(),
        "ARCPAY_DATABASE_MAX_CONNECTIONS",
    );
    push_line(
        "database.timeout_secs",
        config.database.timeout_secs.to_string(),
        "ARCPAY_DATABASE_TIMEOUT_SECS",
    );

    push_line("llm.provider", format!("{:?}", config.llm.provider), "ARCPAY_LLM_PROVIDER");
    push_line("llm.model", config.llm.model.clone(), "ARCPAY_LLM_MODEL");
    push_line(
        "llm.base_url",
        config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
        "ARCPAY_LLM_BASE_URL",
    );
    push_line(
        "llm.api_key",
        redact_secret(config.llm.api_key.is_some()),
        "ARCPAY_LLM_API_KEY",
    );

    push_line("transfer.base_url", config.transfer.base_url.clone(), "ARCPAY_TRANSFER_BASE_URL");
    push_line(
        "transfer.api_key",
        redact_secret(config.transfer.api_key.is_some()),
        "ARCPAY_TRANSFER_API_KEY",
    );
    push_line(
        "transfer.timeout_secs",
        config.transfer.timeout_secs.to_string(),
        "ARCPAY_TRANSFER_TIMEOUT_SECS",
    );

    push_line(
        "server.bind_address",
        config.server.bind_address.clone(),
        "ARCPAY_SERVER_BIND_ADDRESS",
    );
    push_line("server.api_port", config.server.api_port.to_string(), "ARCPAY_SERVER_API_PORT");
    push_line(
        "server.health_check_port",
        config.server.health_check_port.to_string(),
        "ARCPAY_SERVER_HEALTH_CHECK_PORT",
    );

    push_line("logging.level", config.logging.level.clone(), "ARCPAY_LOGGING_LEVEL");
    push_line("logging.format", format!("{:?}", config.logging.format), "ARCPAY_LOGGING_FORMAT");

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("arcpay.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/arcpay.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(present: bool) -> String {
    if present { "<redacted>".to_string() } else { "<unset>".to_string() }
}
