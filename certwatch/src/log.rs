//! Configures the global default tracing subscriber

use thiserror::Error;

pub use tracing_subscriber::{util::TryInitError as LogInitError, EnvFilter as LogFilter};

/// Command-line arguments used to configure logging
#[derive(Clone, Debug, clap::Args)]
pub struct LogArgs {
    /// The filter that determines what tracing spans and events are enabled
    #[clap(long, env = "CERTWATCH_LOG", default_value = "certwatch=info,warn")]
    pub log_level: String,

    /// The log format to use: `plain` or `json`
    #[clap(long, default_value = "plain")]
    pub log_format: LogFormat,
}

/// Configures whether logs should be emitted in plaintext (the default) or as JSON-encoded
/// messages
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// The default plaintext format
    #[default]
    Plain,

    /// The JSON-encoded format
    Json,
}

/// Indicates that an invalid log format was specified
#[derive(Debug, Error)]
#[error("invalid log format: {0} must be 'plain' or 'json'")]
pub struct InvalidLogFormat(String);

/// Indicates that logging could not be initialized
#[derive(Debug, Error)]
pub enum LogError {
    /// The log filter could not be parsed
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    /// A global subscriber was already set
    #[error(transparent)]
    Init(#[from] LogInitError),
}

// === impl LogArgs ===

impl LogArgs {
    /// Parses the log filter and installs the global subscriber
    pub fn try_init(self) -> Result<(), LogError> {
        let filter = LogFilter::try_new(&self.log_level)?;
        self.log_format.try_init(filter)?;
        Ok(())
    }
}

// === impl LogFormat ===

impl std::str::FromStr for LogFormat {
    type Err = InvalidLogFormat;

    fn from_str(s: &str) -> Result<Self, InvalidLogFormat> {
        match s {
            "json" => Ok(LogFormat::Json),
            "plain" => Ok(LogFormat::Plain),
            s => Err(InvalidLogFormat(s.to_string())),
        }
    }
}

impl LogFormat {
    /// Attempts to configure the global default tracing subscriber in the current scope, returning
    /// an error if one is already set
    ///
    /// Logs are written to stderr so that reports on stdout stay parseable.
    pub fn try_init(self, filter: LogFilter) -> Result<(), LogInitError> {
        use tracing_subscriber::prelude::*;

        let registry = tracing_subscriber::registry().with(filter);

        match self {
            LogFormat::Plain => registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()?,

            LogFormat::Json => {
                let event_fmt = tracing_subscriber::fmt::format()
                    // Configure the formatter to output JSON logs.
                    .json()
                    // Output the current span context as a JSON list.
                    .with_span_list(true)
                    // Don't output a field for the current span, since this
                    // would duplicate information already in the span list.
                    .with_current_span(false);

                // Use the JSON event formatter and the JSON field formatter.
                let fmt = tracing_subscriber::fmt::layer()
                    .event_format(event_fmt)
                    .fmt_fields(tracing_subscriber::fmt::format::JsonFields::default())
                    .with_writer(std::io::stderr);

                registry.with(fmt).try_init()?
            }
        };

        Ok(())
    }
}
