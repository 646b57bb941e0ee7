//! Logging setup for the hostguard binary
//!
//! Everything is written to stderr; stdout is reserved for reports.

use crate::config::LoggingConfig;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Log line layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, for interactive runs
    Pretty,
    /// One JSON object per line, for log shippers
    Json,
    /// One line per event
    #[default]
    Compact,
}

impl LogFormat {
    /// Parse a format name; unknown names fall back to compact
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    pub format: LogFormat,
    /// Report each closed span (one per audit) with its duration
    pub spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: LogFormat::Compact,
            spans: false,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn spans(mut self, spans: bool) -> Self {
        self.spans = spans;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }

    fn span_events(&self) -> FmtSpan {
        if self.spans {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    fn layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let base = fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(self.span_events())
            .with_target(false);

        match self.format {
            LogFormat::Json => base.json().boxed(),
            LogFormat::Pretty => base.pretty().boxed(),
            LogFormat::Compact => base.compact().boxed(),
        }
    }
}

impl From<&LoggingConfig> for LogConfig {
    fn from(config: &LoggingConfig) -> Self {
        LogConfig::new()
            .level(config.level.clone())
            .format(LogFormat::parse(&config.format))
            .spans(config.spans)
    }
}

/// Install the global subscriber.
///
/// A second call is ignored, so tests and embedders may call it freely.
pub fn init_logging(config: &LogConfig) {
    let installed = tracing_subscriber::registry()
        .with(config.layer())
        .with(config.filter())
        .try_init();
    if installed.is_err() {
        tracing::debug!("Global subscriber already installed, keeping it");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_logging_config() {
        let logging = LoggingConfig {
            level: "warn".into(),
            format: "PRETTY".into(),
            spans: true,
        };
        let config = LogConfig::from(&logging);
        assert_eq!(config.level, "warn");
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.span_events(), FmtSpan::CLOSE);
    }

    #[test]
    fn test_unknown_format_is_compact() {
        assert_eq!(LogFormat::parse("bogus"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogConfig::default().span_events(), FmtSpan::NONE);
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging(&LogConfig::new().level("debug"));
        init_logging(&LogConfig::new().format(LogFormat::Json));
    }
}
