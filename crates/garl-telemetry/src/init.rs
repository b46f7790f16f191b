// Path: crates/garl-telemetry/src/init.rs
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Output format for the global tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Newline-delimited JSON, suitable for log aggregation in production.
    Json,
    /// Compact, human-readable output, suitable for local development.
    Pretty,
}

impl LogFormat {
    /// Parses `GARL_LOG_FORMAT` ("json" | "pretty"), defaulting to `Json`.
    pub fn from_env() -> Self {
        match std::env::var("GARL_LOG_FORMAT").as_deref() {
            Ok("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

/// Initializes the global `tracing` subscriber.
///
/// Level is read from `GARL_LOG_LEVEL`, falling back to `RUST_LOG`, falling
/// back to `info`.
pub fn init_tracing(format: LogFormat) -> Result<(), anyhow::Error> {
    let filter = std::env::var("GARL_LOG_LEVEL")
        .ok()
        .and_then(|v| EnvFilter::try_new(v).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    match format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_timer(fmt::time::UtcTime::rfc_3339());
            let subscriber = Registry::default().with(filter).with(fmt_layer);
            tracing_log::LogTracer::init()?;
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true);
            let subscriber = Registry::default().with(filter).with(fmt_layer);
            tracing_log::LogTracer::init()?;
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}
