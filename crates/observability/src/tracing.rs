//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// `EnvFilter` directive, e.g. `info,keystone_rbac=debug`.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl TracingConfig {
    pub const ENV_FORMAT: &'static str = "KEYSTONE_LOG_FORMAT";

    /// `RUST_LOG` for the filter, `KEYSTONE_LOG_FORMAT=pretty` for human output.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(filter) = std::env::var(EnvFilter::DEFAULT_ENV) {
            config.filter = filter;
        }
        if let Ok(format) = std::env::var(Self::ENV_FORMAT) {
            config.format = parse_format(&format);
        }
        config
    }
}

fn parse_format(raw: &str) -> LogFormat {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pretty" | "text" => LogFormat::Pretty,
        _ => LogFormat::Json,
    }
}

/// Install the global subscriber.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(config: &TracingConfig) {
    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(true);

    let _ = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}
