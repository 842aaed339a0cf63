use anyhow::Result;
use dotenvy::dotenv;
use log::{error, info, warn};
use std::sync::Arc;

use voice_reminders::core::Config;
use voice_reminders::database::Database;
use voice_reminders::features::calls::VapiDispatcher;
use voice_reminders::features::reminders::ReminderScheduler;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting reminder daemon...");

    let database = Database::new(&config.database_path).await?;

    let dispatcher = VapiDispatcher::from_config(&config)?;
    if dispatcher.is_mock() {
        warn!("VAPI_PRIVATE_KEY not set - calls will be simulated, not placed");
    } else if config.vapi_phone_number_id.is_none() {
        warn!("VAPI_PHONE_NUMBER_ID not set - every call attempt will fail");
    }

    let scheduler =
        ReminderScheduler::from_config(&config, Arc::new(database), Arc::new(dispatcher));
    info!(
        "Polling every {}s, call timeout {}s",
        config.poll_interval.as_secs(),
        config.call_timeout.as_secs()
    );
    let handle = scheduler.start();

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
    }

    info!("Shutdown requested, finishing current cycle...");
    handle.stop().await?;
    info!("Reminder daemon stopped");

    Ok(())
}
