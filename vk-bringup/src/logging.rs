//! Logging setup built on `tracing`.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Installs the global `tracing` subscriber, writing to `stderr`.
///
/// `RUST_LOG` takes precedence over `config.level`. Calling this again after a
/// subscriber is installed has no effect.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        let config = LoggingConfig { level: "debug".to_string() };
        init_logging(&config);
        init_logging(&config);
        tracing::debug!("logging initialised twice");
    }
}
