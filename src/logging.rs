//! Logging - tracing subscriber for the CLI, written to stderr so stdout
//! carries only the JSON views.

use tracing_subscriber::{fmt, EnvFilter};

/// `json` for one object per line, `compact` for single-line text.
/// Anything else (or unset) is the multi-line pretty format.
pub const ENV_LOG_FORMAT: &str = "LEDGERLINK_LOG_FORMAT";

/// Used when `RUST_LOG` is unset: client events at `info`, dependencies
/// only when they warn.
pub const DEFAULT_FILTER: &str = "warn,ledgerlink=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    pub fn from_value(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("json") | Some("1") => LogFormat::Json,
            Some("compact") => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }

    pub fn from_env() -> Self { Self::from_value(std::env::var(ENV_LOG_FORMAT).ok().as_deref()) }
}

/// Install the global subscriber. A second call leaves the first in place.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = fmt::Subscriber::builder().with_env_filter(env_filter).with_writer(std::io::stderr);

    let installed = match LogFormat::from_env() {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    if installed.is_ok() {
        tracing::debug!(filter = DEFAULT_FILTER, "logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_env_value() {
        assert_eq!(LogFormat::from_value(None), LogFormat::Pretty);
        assert_eq!(LogFormat::from_value(Some("JSON")), LogFormat::Json);
        assert_eq!(LogFormat::from_value(Some("1")), LogFormat::Json);
        assert_eq!(LogFormat::from_value(Some(" compact ")), LogFormat::Compact);
        assert_eq!(LogFormat::from_value(Some("verbose")), LogFormat::Pretty);
    }

    #[test]
    fn default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }

    #[test]
    fn repeated_init_is_harmless() {
        init_logging();
        init_logging();
    }
}
