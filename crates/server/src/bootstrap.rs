use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use arcpay_agent::IntentExtractor;
use arcpay_core::config::{AppConfig, ConfigError, LoadOptions};
use arcpay_db::repositories::{
    SqlActivityRepository, SqlPolicyRepository, SqlTransactionRepository,
};
use arcpay_db::{connect_with_settings, migrations, DbPool};
use arcpay_transfer::{SandboxBackend, TransferExecutor};

use crate::llm::HttpLlmClient;
use crate::workflow::PaymentWorkflow;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub workflow: Arc<PaymentWorkflow>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let extractor = IntentExtractor::new(Arc::new(HttpLlmClient::new(config.llm.clone())));
    let backend = Arc::new(SandboxBackend::new(
        config.transfer.base_url.clone(),
        config.transfer.api_key.clone(),
    ));
    let executor =
        TransferExecutor::new(backend, Duration::from_secs(config.transfer.timeout_secs));

    let workflow = Arc::new(PaymentWorkflow::new(
        Arc::new(SqlPolicyRepository::new(db_pool.clone())),
        Arc::new(SqlActivityRepository::new(db_pool.clone())),
        Arc::new(SqlTransactionRepository::new(db_pool.clone())),
        extractor,
        executor,
    ));

    Ok(Application { config, db_pool, workflow })
}
