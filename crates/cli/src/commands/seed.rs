use chrono::Utc;
use uuid::Uuid;

use crate::commands::CommandResult;
use arcpay_core::config::{AppConfig, LoadOptions};
use arcpay_core::domain::policy::{Policy, PolicyId};
use arcpay_db::repositories::{PolicyRepository, SqlPolicyRepository};
use arcpay_db::{connect_with_settings, migrations};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let policies = SqlPolicyRepository::new(pool.clone());
        let message = match policies
            .current()
            .await
            .map_err(|error| ("seed_read", error.to_string(), 6u8))?
        {
            Some(existing) => format!(
                "policy already present ({}); seed left the database untouched",
                existing.id.0
            ),
            None => {
                let seeded =
                    Policy::seed_default(PolicyId(Uuid::new_v4().to_string()), Utc::now());
                policies
                    .save(seeded)
                    .await
                    .map_err(|error| ("seed_write", error.to_string(), 6u8))?;
                "seeded default spending policy \
                 (max_tx_amount=1000, monthly_budget=5000, allow_list=Stripe/Circle/Amazon)"
                    .to_string()
            }
        };

        pool.close().await;
        Ok::<String, (&'static str, String, u8)>(message)
    });

    match result {
        Ok(message) => CommandResult::success("seed", message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}
