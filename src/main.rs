use campaign_automation_worker::{config, crypto, db, facebook, worker};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load configuration
    let config = config::Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.rust_log))
        .init();

    let decryptor = crypto::AesGcmDecryptor::from_hex_key(&config.encryption_key)?;

    // Initialize database connection
    let db = Arc::new(tokio::sync::Mutex::new(
        db::Database::new(&config.database_url, config.database_tls_verify).await?,
    ));

    let api = facebook::GraphClient::new(
        &config.graph_base_url,
        &config.graph_api_version,
        Duration::from_secs(config.graph_timeout_secs),
    )?;

    let worker = worker::AutomationWorker::new(
        db,
        api,
        Box::new(decryptor),
        config.dry_run,
        Duration::from_secs(config.worker_interval_secs),
    );

    if config.dry_run {
        log::info!("Dry run enabled: matching campaigns are logged, not paused");
    }

    if config.run_once {
        worker.run_once().await?;
    } else {
        worker.run().await?;
    }

    Ok(())
}
