//! Test configuration helpers

use std::sync::Once;
use std::time::Duration;
use news_enrich::{Config, RetryConfig};

static TRACING: Once = Once::new();

/// Install a test subscriber honouring `RUST_LOG` (once per test binary)
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Default configuration with short, deterministic retry delays
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.retry = RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config
}
