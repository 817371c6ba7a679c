//! Logging setup shared by the CLI and the Lambda

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines on stderr
    Text,
    /// One JSON object per line on stdout (CloudWatch)
    Json,
}

/// Map a `LOG_LEVEL` value to a tracing level.
///
/// Accepts critical, error, warning, info and debug in any case. Anything
/// else, including an unset variable, falls back to INFO.
pub fn parse_log_level(raw: Option<&str>) -> Level {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("critical") | Some("error") => Level::ERROR,
        Some("warning") | Some("warn") => Level::WARN,
        Some("debug") => Level::DEBUG,
        Some("trace") => Level::TRACE,
        _ => Level::INFO,
    }
}

/// Install the global subscriber
pub fn init_logging(level: Level, format: LogFormat) -> Result<()> {
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false);

    match format {
        LogFormat::Text => builder
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e)),
        LogFormat::Json => builder
            .json()
            .with_ansi(false)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e)),
    }
}
