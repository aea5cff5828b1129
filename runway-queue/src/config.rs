//! Queue configuration
//!
//! Defines all configurable parameters of the run queue: where the project and
//! builder APIs live, request defaults, expiration limits and polling intervals.

use std::time::Duration;

/// Run queue configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Base URL of the project API (e.g., "http://localhost:8080/api")
    pub project_api_url: String,

    /// Base URL of the builder API
    pub builder_api_url: String,

    /// Memory (MB) given to an application when neither the caller nor the project sets it
    pub default_memory_size: u32,

    /// Maximum time a request may wait before it is handed to a runner
    pub max_time_in_queue: Duration,

    /// Seconds an application may run once started
    pub app_lifetime: u64,

    /// Pause between two build status checks
    pub build_poll_interval: Duration,

    /// Pause between two rounds of runner capacity checks
    pub runner_poll_interval: Duration,

    /// Capacity queries that may fail during one runner selection before it gives up
    pub max_state_failures: u32,

    /// How long `stop` waits for running tasks before cancelling them
    pub shutdown_grace: Duration,

    /// How often expired tasks are swept in the background; zero disables the background sweep
    pub sweep_interval: Duration,

    /// Max tasks executing at once; zero means unbounded
    pub max_concurrent_tasks: usize,

    /// Runner services registered into the shared pool at startup
    pub runner_services: Vec<String>,
}

impl QueueConfig {
    /// Creates a new configuration with defaults
    pub fn new(project_api_url: String, builder_api_url: String) -> Self {
        Self {
            project_api_url,
            builder_api_url,
            default_memory_size: 256,
            max_time_in_queue: Duration::from_secs(600),
            app_lifetime: 900,
            build_poll_interval: Duration::from_secs(2),
            runner_poll_interval: Duration::from_secs(2),
            max_state_failures: 10,
            shutdown_grace: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(30),
            max_concurrent_tasks: 0,
            runner_services: Vec::new(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - RUNWAY_PROJECT_API_URL (required)
    /// - RUNWAY_BUILDER_API_URL (optional, defaults to the project API URL)
    /// - RUNWAY_DEFAULT_MEMORY_SIZE (optional, MB, default: 256)
    /// - RUNWAY_MAX_TIME_IN_QUEUE (optional, seconds, default: 600)
    /// - RUNWAY_APP_LIFETIME (optional, seconds, default: 900)
    /// - RUNWAY_BUILD_POLL_INTERVAL (optional, seconds, default: 2)
    /// - RUNWAY_RUNNER_POLL_INTERVAL (optional, seconds, default: 2)
    /// - RUNWAY_MAX_STATE_FAILURES (optional, default: 10)
    /// - RUNWAY_SHUTDOWN_GRACE (optional, seconds, default: 30)
    /// - RUNWAY_SWEEP_INTERVAL (optional, seconds, default: 30)
    /// - RUNWAY_MAX_CONCURRENT_TASKS (optional, default: 0)
    /// - RUNWAY_RUNNER_SERVICES (optional, comma-separated URLs)
    pub fn from_env() -> anyhow::Result<Self> {
        let project_api_url = std::env::var("RUNWAY_PROJECT_API_URL")
            .map_err(|_| anyhow::anyhow!("RUNWAY_PROJECT_API_URL environment variable not set"))?;

        let builder_api_url =
            std::env::var("RUNWAY_BUILDER_API_URL").unwrap_or_else(|_| project_api_url.clone());

        let defaults = Self::new(project_api_url, builder_api_url);

        let runner_services = std::env::var("RUNWAY_RUNNER_SERVICES")
            .map(|s| parse_list(&s))
            .unwrap_or_default();

        Ok(Self {
            default_memory_size: env_parse("RUNWAY_DEFAULT_MEMORY_SIZE")
                .unwrap_or(defaults.default_memory_size),
            max_time_in_queue: env_secs("RUNWAY_MAX_TIME_IN_QUEUE")
                .unwrap_or(defaults.max_time_in_queue),
            app_lifetime: env_parse("RUNWAY_APP_LIFETIME").unwrap_or(defaults.app_lifetime),
            build_poll_interval: env_secs("RUNWAY_BUILD_POLL_INTERVAL")
                .unwrap_or(defaults.build_poll_interval),
            runner_poll_interval: env_secs("RUNWAY_RUNNER_POLL_INTERVAL")
                .unwrap_or(defaults.runner_poll_interval),
            max_state_failures: env_parse("RUNWAY_MAX_STATE_FAILURES")
                .unwrap_or(defaults.max_state_failures),
            shutdown_grace: env_secs("RUNWAY_SHUTDOWN_GRACE").unwrap_or(defaults.shutdown_grace),
            sweep_interval: env_secs("RUNWAY_SWEEP_INTERVAL").unwrap_or(defaults.sweep_interval),
            max_concurrent_tasks: env_parse("RUNWAY_MAX_CONCURRENT_TASKS")
                .unwrap_or(defaults.max_concurrent_tasks),
            runner_services,
            ..defaults
        })
    }

    /// Adds a runner service to register at startup
    pub fn with_runner_service(mut self, url: impl Into<String>) -> Self {
        self.runner_services.push(url.into());
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, url) in [
            ("project_api_url", &self.project_api_url),
            ("builder_api_url", &self.builder_api_url),
        ] {
            if url.is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }

        if self.default_memory_size == 0 {
            anyhow::bail!("default_memory_size must be greater than 0");
        }

        if self.app_lifetime == 0 {
            anyhow::bail!("app_lifetime must be greater than 0");
        }

        if self.build_poll_interval.is_zero() || self.runner_poll_interval.is_zero() {
            anyhow::bail!("poll intervals must be greater than 0");
        }

        Ok(())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new(
            "http://localhost:8080/api".to_string(),
            "http://localhost:8080/api".to_string(),
        )
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse::<T>().ok())
}

fn env_secs(name: &str) -> Option<Duration> {
    env_parse::<u64>(name).map(Duration::from_secs)
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
