//! Logging bootstrap.

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use whippet_config::GenericConfiguration;

fn default_log_level() -> String {
    "info".to_string()
}

pub(crate) struct LoggingConfiguration {
    /// Log level filtering directives, in `tracing` env-filter syntax.
    pub log_level: String,

    /// Whether log lines are emitted as JSON rather than the human-readable format.
    pub log_format_json: bool,
}

impl LoggingConfiguration {
    /// Builds the logging configuration from the loaded configuration.
    ///
    /// Unset fields fall back to `info`-level, human-readable console output.
    pub fn from_configuration(config: &GenericConfiguration) -> Self {
        Self {
            log_level: config
                .try_get_typed::<String>("log_level")
                .ok()
                .flatten()
                .unwrap_or_else(default_log_level),
            log_format_json: config.get_typed_or_default::<bool>("log_format_json"),
        }
    }
}

/// Initializes the logging subsystem for `tracing`.
///
/// # Errors
///
/// If the filtering directives are malformed, or the logging subsystem was already initialized, an
/// error is returned.
pub(crate) fn initialize_logging(config: &LoggingConfiguration) -> Result<(), anyhow::Error> {
    let filter_layer = EnvFilter::try_new(&config.log_level)?;
    let registry = tracing_subscriber::registry().with(filter_layer);

    if config.log_format_json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()?;
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()?;
    }

    Ok(())
}
