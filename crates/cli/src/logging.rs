use classcover_core::config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber once. `RUST_LOG` wins over the configured
/// level; a second call is a no-op.
pub fn init(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    if let Err(error) = installed {
        tracing::debug!(%error, "subscriber already installed");
    }
}
