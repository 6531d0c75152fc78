//! Observability: structured logging.
//!
//! # Quick start
//!
//! ```rust,no_run
//! # use crm_server::{config::Config, observability};
//! let config = Config::from_env().expect("config");
//! // Before any logging:
//! observability::init(&config);
//! ```

use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::{Config, LogFormat};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "crm_server=debug";

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG`, falling back to [`DEFAULT_FILTER`]. Returns `false` if a
/// global subscriber was already installed (e.g. by a test harness).
pub fn init(config: &Config) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = match config.log_format {
        LogFormat::Json => Registry::default()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => Registry::default()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };

    match result {
        Ok(()) => {
            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                format = ?config.log_format,
                "Logging initialized"
            );
            true
        }
        Err(_) => false,
    }
}
