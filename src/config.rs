//! Environment-driven configuration with defaults.

use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Pause between scheduler ticks.
    pub scheduler_interval: Duration,
    /// Maximum due jobs applied per tick.
    pub scheduler_batch_size: usize,
    /// How long an idempotency record shields its key.
    pub idempotency_ttl: chrono::Duration,
    /// Pause between idempotency sweep passes.
    pub sweep_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            scheduler_interval: Duration::from_secs(60),
            scheduler_batch_size: 10,
            idempotency_ttl: chrono::Duration::hours(24),
            sweep_interval: Duration::from_secs(3600),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            scheduler_interval: Duration::from_secs(env_u64(
                "SCHEDULER_INTERVAL_SECS",
                defaults.scheduler_interval.as_secs(),
            )),
            scheduler_batch_size: env_u64("SCHEDULER_BATCH_SIZE", 10) as usize,
            idempotency_ttl: chrono::Duration::hours(env_u64("IDEMPOTENCY_TTL_HOURS", 24) as i64),
            sweep_interval: Duration::from_secs(env_u64(
                "IDEMPOTENCY_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval.as_secs(),
            )),
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Err(_) => default,
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(name, value = %raw, "invalid numeric environment value, using default");
            default
        }),
    }
}
