//! Log setup for the resource binary.
//!
//! Stdout carries the protocol response, so every log line goes to stderr.

use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

/// `EnvFilter` directives, e.g. `lambda_resource=debug`.
pub const LOG_FILTER_ENV: &str = "LAMBDA_RESOURCE_LOG";
/// `json` (default) or `text`.
pub const LOG_FORMAT_ENV: &str = "LAMBDA_RESOURCE_LOG_FORMAT";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("text") => Self::Text,
            _ => Self::Json,
        }
    }
}

pub fn build_subscriber<W>(
    format: LogFormat,
    filter: EnvFilter,
    writer: W,
) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => Box::new(
            registry.with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer),
            ),
        ),
        LogFormat::Text => Box::new(
            registry.with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer),
            ),
        ),
    }
}

/// Installs the global subscriber from the environment. A second call is a
/// no-op.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let format = LogFormat::from_env_value(std::env::var(LOG_FORMAT_ENV).ok().as_deref());

    let subscriber = build_subscriber(format, filter, std::io::stderr);
    if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install log subscriber: {error}");
    }
}
