use serde::Deserialize;
use tracing_subscriber::fmt::SubscriberBuilder;
use tracing_subscriber::EnvFilter;

pub(super) struct LoggerConfig {
    pub format: LoggerFormat,
    pub level: String,
}

#[derive(Deserialize, Debug, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub(crate) enum LoggerFormat {
    Json,
    #[default]
    Pretty,
}

/// Logs go to stderr so command output stays clean. `RUST_LOG` wins over the configured level.
pub(super) fn init_logger(config: LoggerConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = SubscriberBuilder::default().with_env_filter(filter).with_writer(std::io::stderr);

    match config.format {
        LoggerFormat::Json => builder.json().init(),
        LoggerFormat::Pretty => builder.pretty().init(),
    }
}
