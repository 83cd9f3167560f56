use clap::ValueEnum;
use tracing::level_filters::LevelFilter;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }

    /// Effective log level: the `--log-level` flag wins, then
    /// `HUBLINK_LOG_LEVEL`, then `RUST_LOG`, then `info`.
    pub fn resolve(flag: Option<LogLevel>) -> LogLevel {
        flag.or_else(|| Self::from_env("HUBLINK_LOG_LEVEL"))
            .or_else(|| Self::from_env("RUST_LOG"))
            .unwrap_or(LogLevel::Info)
    }

    fn from_env(var: &str) -> Option<LogLevel> {
        let value = std::env::var(var).ok()?;
        Self::from_str(value.trim(), true).ok()
    }
}

/// Install the stderr subscriber for the rest of the process. Gateway
/// traffic goes to stdout; diagnostics must stay out of its way.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level.as_filter())
        .with_ansi(false)
        .with_target(false);

    // A second init (e.g. from tests) keeps the first subscriber.
    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_resolution_precedence() {
        // Touches process-global environment; covers the whole precedence
        // chain in one sequence to stay race-free under parallel tests.
        std::env::remove_var("HUBLINK_LOG_LEVEL");
        assert_eq!(LogLevel::resolve(Some(LogLevel::Trace)), LogLevel::Trace);

        std::env::set_var("HUBLINK_LOG_LEVEL", "debug");
        assert_eq!(LogLevel::resolve(Some(LogLevel::Warn)), LogLevel::Warn);
        assert_eq!(LogLevel::resolve(None), LogLevel::Debug);

        std::env::set_var("HUBLINK_LOG_LEVEL", "not-a-level");
        std::env::remove_var("RUST_LOG");
        assert_eq!(LogLevel::resolve(None), LogLevel::Info);

        std::env::remove_var("HUBLINK_LOG_LEVEL");
    }

    #[test]
    fn env_levels_parse_case_insensitively() {
        assert_eq!(
            LogLevel::from_str("WARN", true).ok(),
            Some(LogLevel::Warn)
        );
        assert_eq!(
            LogLevel::from_str("trace", true).ok(),
            Some(LogLevel::Trace)
        );
        assert!(LogLevel::from_str("verbose", true).is_err());
    }
}
