use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::FmtSubscriber;

use crate::error::{Result, VisionError};

/// Install the stderr subscriber. `-q` wins over the config file, `-v`
/// flags raise the level above it.
pub fn init_logging(verbosity: u8, quiet: bool, config_level: &str) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(resolve_level(verbosity, quiet, config_level))
        .with_target(false)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| VisionError::Config(format!("Failed to set tracing subscriber: {}", e)))
}

fn resolve_level(verbosity: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::WARN;
    }

    match verbosity {
        0 => parse_log_level(config_level),
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn parse_log_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("trace"), Level::TRACE);
        assert_eq!(parse_log_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_log_level("info"), Level::INFO);
        assert_eq!(parse_log_level("warn"), Level::WARN);
        assert_eq!(parse_log_level("error"), Level::ERROR);
        assert_eq!(parse_log_level("invalid"), Level::INFO);
    }

    #[test]
    fn flags_override_config_level() {
        assert_eq!(resolve_level(0, false, "error"), Level::ERROR);
        assert_eq!(resolve_level(1, false, "error"), Level::DEBUG);
        assert_eq!(resolve_level(3, false, "error"), Level::TRACE);
        assert_eq!(resolve_level(0, true, "trace"), Level::WARN);
    }
}
