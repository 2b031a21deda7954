use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

/// Target prefix shared by every crate in the workspace.
const OWN_TARGETS: &str = "netsdr";

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    /// One flattened JSON object per event.
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

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// `level` for the netsdr crates; everything else is capped at warnings.
fn log_targets(level: LogLevel) -> Targets {
    let own = LevelFilter::from(level);
    Targets::new()
        .with_default(own.min(LevelFilter::WARN))
        .with_target(OWN_TARGETS, own)
}

/// Install the stderr subscriber.
///
/// Thread names are included so events from the control listener and the
/// telemetry sink can be told apart from the foreground.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let filter = log_targets(level);
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_thread_names(true);

    let registry = tracing_subscriber::registry();
    // A subscriber installed earlier (tests, embedding) wins.
    let _ = match format {
        LogFormat::Text => registry.with(layer.with_filter(filter)).try_init(),
        LogFormat::Json => registry
            .with(layer.json().flatten_event(true).with_filter(filter))
            .try_init(),
    };
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;

    #[test]
    fn levels_map_to_filters() {
        assert_eq!(LevelFilter::from(LogLevel::Warn), LevelFilter::WARN);
        assert_eq!(LevelFilter::from(LogLevel::Trace), LevelFilter::TRACE);
        assert!(LevelFilter::from(LogLevel::Error) < LevelFilter::from(LogLevel::Info));
    }

    #[test]
    fn own_crates_follow_requested_level() {
        let targets = log_targets(LogLevel::Debug);
        assert!(targets.would_enable("netsdr_session::listener", &Level::DEBUG));
        assert!(targets.would_enable("netsdr", &Level::INFO));
        assert!(!targets.would_enable("netsdr_session::telemetry", &Level::TRACE));
    }

    #[test]
    fn other_crates_are_capped_at_warn() {
        let verbose = log_targets(LogLevel::Trace);
        assert!(verbose.would_enable("ctrlc", &Level::WARN));
        assert!(!verbose.would_enable("ctrlc", &Level::INFO));

        let quiet = log_targets(LogLevel::Error);
        assert!(!quiet.would_enable("ctrlc", &Level::WARN));
        assert!(quiet.would_enable("netsdr_transport::control", &Level::ERROR));
    }
}
