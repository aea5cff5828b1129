//! Runway Queue service
//!
//! Starts the run queue against the configured project and builder APIs,
//! registers the runner services listed in the configuration, then runs
//! until interrupted.

use anyhow::{Context, Result};
use runway_client::{BuilderApiClient, ProjectApiClient};
use runway_core::dto::registration::RunnerServiceRegistration;
use runway_queue::remote::HttpRunnerConnector;
use runway_queue::{QueueConfig, RunQueue};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "runway_queue=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Runway Queue");

    let config = load_config()?;
    info!(
        "Loaded configuration: project_api_url={}, builder_api_url={}",
        config.project_api_url, config.builder_api_url
    );

    let http = reqwest::Client::new();
    let projects = Arc::new(ProjectApiClient::with_client(
        config.project_api_url.clone(),
        http.clone(),
    ));
    let builder = Arc::new(BuilderApiClient::with_client(
        config.builder_api_url.clone(),
        http.clone(),
    ));
    let connector = Arc::new(HttpRunnerConnector::new(http));

    let queue = Arc::new(RunQueue::new(config.clone(), projects, builder, connector));
    queue.start().context("Failed to start run queue")?;

    for url in &config.runner_services {
        let registration = RunnerServiceRegistration::shared(url.clone());
        if let Err(e) = register_with_retry(&queue, &registration).await {
            error!("{:#}", e);
        }
    }

    info!(
        "Run queue ready: max time in queue {:?}, application lifetime {}s",
        config.max_time_in_queue, config.app_lifetime
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutdown signal received, stopping run queue");
    queue.stop().await?;

    Ok(())
}

/// Loads configuration from environment variables with fallback to defaults
fn load_config() -> Result<QueueConfig> {
    match QueueConfig::from_env() {
        Ok(config) => {
            config.validate()?;
            Ok(config)
        }
        Err(_) => {
            info!("Failed to load config from environment, using defaults");
            let config = QueueConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

/// Registers a runner service, retrying with exponential backoff
///
/// Runner services often come up after the queue in container environments.
async fn register_with_retry(
    queue: &RunQueue,
    registration: &RunnerServiceRegistration,
) -> Result<()> {
    const MAX_RETRIES: u32 = 10;
    const INITIAL_DELAY_MS: u64 = 500;
    const MAX_DELAY_MS: u64 = 30_000;

    let url = &registration.location.url;
    let mut attempt = 0;
    let mut delay_ms = INITIAL_DELAY_MS;

    loop {
        attempt += 1;

        match queue.register_runner_service(registration).await {
            Ok(_) => {
                info!(
                    "Registered runner service {} after {} attempt(s)",
                    url, attempt
                );
                return Ok(());
            }
            Err(e) => {
                if attempt >= MAX_RETRIES {
                    return Err(anyhow::anyhow!(
                        "Failed to register runner service {} after {} attempts: {}",
                        url,
                        MAX_RETRIES,
                        e
                    ));
                }

                warn!(
                    "Failed to register runner service {} (attempt {}/{}): {}",
                    url, attempt, MAX_RETRIES, e
                );
                warn!("Retrying in {} ms...", delay_ms);

                tokio::time::sleep(Duration::from_millis(delay_ms)).await;

                delay_ms = (delay_ms * 2).min(MAX_DELAY_MS);
            }
        }
    }
}
