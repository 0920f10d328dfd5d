use tracing::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::ring::LogRing;

/// How many recent log lines are retained for out-of-band subscribers.
const LOG_STREAM_LIMIT: usize = 5;

pub struct LoggerConfig {
    whoami: String,
    debug: bool,
}

impl LoggerConfig {
    pub fn new(whoami: String, debug: bool) -> Self {
        Self { whoami, debug }
    }
}

/// Initializes the logging subsystem with the provided config.
///
/// Debug mode writes human-readable compact lines at `debug` level;
/// otherwise output is JSON at `info`. `RUST_LOG` overrides the level in
/// both modes. The returned [`LogRing`] tees the most recent lines for
/// subscribers outside the stdout stream.
pub fn init(config: LoggerConfig) -> LogRing {
    let default_level = if config.debug { "debug" } else { "info" };
    let filt =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stdout_sub = if config.debug {
        tracing_subscriber::fmt::layer().compact().boxed()
    } else {
        tracing_subscriber::fmt::layer().json().boxed()
    };

    let ring = LogRing::new(LOG_STREAM_LIMIT);
    let ring_sub = tracing_subscriber::fmt::layer()
        .compact()
        .with_ansi(false)
        .with_writer(ring.clone());

    tracing_subscriber::registry()
        .with(filt)
        .with(stdout_sub)
        .with(ring_sub)
        .init();

    info!(whoami = %config.whoami, "logging started");

    ring
}
