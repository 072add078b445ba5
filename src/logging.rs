//! Tracing setup for the CLI binary

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the log filter directives
pub const LOG_ENV: &str = "CSR_LOG";

/// Initialize tracing with the `CSR_LOG` environment variable.
///
/// Defaults to "info" level if `CSR_LOG` is not set. Logs go to stderr so
/// the ledger CSV on stdout stays clean.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
