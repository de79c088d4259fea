//! Logging and tracing initialization.

use crate::config::LoggingConfig;

/// Initialize the tracing subscriber with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.json {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
}

/// Build a logging config from CLI verbosity flags.
pub fn logging_for_verbosity(base: &LoggingConfig, verbose: u8, json: bool) -> LoggingConfig {
    let level = match verbose {
        0 => base.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    LoggingConfig {
        level,
        json: json || base.json,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_overrides_level() {
        let base = LoggingConfig::default();
        assert_eq!(logging_for_verbosity(&base, 0, false).level, "info");
        assert_eq!(logging_for_verbosity(&base, 1, false).level, "debug");
        assert_eq!(logging_for_verbosity(&base, 3, false).level, "trace");
        assert!(logging_for_verbosity(&base, 0, true).json);
    }
}
